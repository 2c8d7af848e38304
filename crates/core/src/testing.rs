//! Sample catalog shared by tests across the workspace
//!
//! A small shop: manufacturers, categories, products with translations and
//! prices, and orders whose line items point at products.
//!
//! | entity | notable declarations |
//! |--------|----------------------|
//! | `product` | `name`/`description` translated, `manufacturer_id` SetNull, `category_id` Restrict |
//! | `product_translation` | `product_id` Cascade, `language` |
//! | `product_price` | `product_id` Cascade |
//! | `order_line_item` | `order_id` Cascade, `product_id` SetNull |

use crate::registry::SchemaRegistry;
use crate::schema::{Association, EntityDefinition, EntitySchema, FieldDefinition, OnDelete};

/// `manufacturer`
pub struct ManufacturerDefinition;

impl EntityDefinition for ManufacturerDefinition {
    const ENTITY_NAME: &'static str = "manufacturer";

    fn schema() -> EntitySchema {
        EntitySchema::new(Self::ENTITY_NAME)
            .field(FieldDefinition::string("name").required())
            .field(FieldDefinition::string("link"))
            .association(Association::one_to_many("products", "product", "manufacturer_id"))
    }
}

/// `category`
pub struct CategoryDefinition;

impl EntityDefinition for CategoryDefinition {
    const ENTITY_NAME: &'static str = "category";

    fn schema() -> EntitySchema {
        EntitySchema::new(Self::ENTITY_NAME)
            .field(FieldDefinition::string("name").required())
            .field(FieldDefinition::bool("active"))
            .association(Association::one_to_many("products", "product", "category_id"))
    }
}

/// `product`
pub struct ProductDefinition;

impl EntityDefinition for ProductDefinition {
    const ENTITY_NAME: &'static str = "product";

    fn schema() -> EntitySchema {
        EntitySchema::new(Self::ENTITY_NAME)
            .field(FieldDefinition::string("name").required().translated())
            .field(FieldDefinition::text("description").translated())
            .field(FieldDefinition::string("product_number"))
            .field(FieldDefinition::int("stock"))
            .field(FieldDefinition::float("price"))
            .field(FieldDefinition::bool("active"))
            .field(FieldDefinition::json("attributes"))
            .field(FieldDefinition::datetime("release_date"))
            .field(FieldDefinition::foreign_key(
                "manufacturer_id",
                "manufacturer",
                OnDelete::SetNull,
            ))
            .field(FieldDefinition::foreign_key(
                "category_id",
                "category",
                OnDelete::Restrict,
            ))
            .association(Association::many_to_one(
                "manufacturer",
                "manufacturer",
                "manufacturer_id",
            ))
            .association(Association::many_to_one("category", "category", "category_id"))
            .association(Association::one_to_many("prices", "product_price", "product_id"))
            .association(Association::translations(
                "translations",
                "product_translation",
                "product_id",
                "language",
            ))
    }
}

/// `product_translation`
pub struct ProductTranslationDefinition;

impl EntityDefinition for ProductTranslationDefinition {
    const ENTITY_NAME: &'static str = "product_translation";

    fn schema() -> EntitySchema {
        EntitySchema::new(Self::ENTITY_NAME)
            .field(
                FieldDefinition::foreign_key("product_id", "product", OnDelete::Cascade)
                    .required(),
            )
            .field(FieldDefinition::string("language").required())
            .field(FieldDefinition::string("name"))
            .field(FieldDefinition::text("description"))
    }
}

/// `product_price`
pub struct ProductPriceDefinition;

impl EntityDefinition for ProductPriceDefinition {
    const ENTITY_NAME: &'static str = "product_price";

    fn schema() -> EntitySchema {
        EntitySchema::new(Self::ENTITY_NAME)
            .field(
                FieldDefinition::foreign_key("product_id", "product", OnDelete::Cascade)
                    .required(),
            )
            .field(FieldDefinition::int("quantity_start").required())
            .field(FieldDefinition::float("amount").required())
            .association(Association::many_to_one("product", "product", "product_id"))
    }
}

/// `order`
pub struct OrderDefinition;

impl EntityDefinition for OrderDefinition {
    const ENTITY_NAME: &'static str = "order";

    fn schema() -> EntitySchema {
        EntitySchema::new(Self::ENTITY_NAME)
            .field(FieldDefinition::string("order_number").required())
            .field(FieldDefinition::float("amount_total"))
            .association(Association::one_to_many(
                "line_items",
                "order_line_item",
                "order_id",
            ))
    }
}

/// `order_line_item`
pub struct OrderLineItemDefinition;

impl EntityDefinition for OrderLineItemDefinition {
    const ENTITY_NAME: &'static str = "order_line_item";

    fn schema() -> EntitySchema {
        EntitySchema::new(Self::ENTITY_NAME)
            .field(FieldDefinition::foreign_key("order_id", "order", OnDelete::Cascade).required())
            .field(FieldDefinition::foreign_key(
                "product_id",
                "product",
                OnDelete::SetNull,
            ))
            .field(FieldDefinition::string("label"))
            .field(FieldDefinition::int("quantity").required())
            .association(Association::many_to_one("product", "product", "product_id"))
    }
}

/// The sample catalog as a validated registry
///
/// # Panics
///
/// Panics if the sample schemas are inconsistent, which would be a bug in
/// this module.
pub fn catalog() -> SchemaRegistry {
    SchemaRegistry::builder()
        .register_definition::<ManufacturerDefinition>()
        .register_definition::<CategoryDefinition>()
        .register_definition::<ProductDefinition>()
        .register_definition::<ProductTranslationDefinition>()
        .register_definition::<ProductPriceDefinition>()
        .register_definition::<OrderDefinition>()
        .register_definition::<OrderLineItemDefinition>()
        .build()
        .expect("sample catalog is valid")
}
