//! Offline attribute schemas built from the part registry.

use async_trait::async_trait;
use forgebom_core::{AdapterError, AttributeSchema, PartType, SchemaGenerator};
use serde_json::{Map, Value, json};

/// Schema generator that needs no model: the attributes the registry knows
/// about for a part type, each expecting a value and a confidence.
///
/// Used in safe mode and whenever no schema service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistrySchemaGenerator;

impl RegistrySchemaGenerator {
    pub fn schema_for(part_type: &str) -> AttributeSchema {
        let mut properties = Map::new();
        if let Some(part) = PartType::parse(part_type) {
            let descriptor = part.descriptor();
            let names = descriptor
                .safe_defaults
                .iter()
                .map(|(name, _)| *name)
                .chain(descriptor.critical_attribute.map(|c| c.attribute))
                .chain(descriptor.geometry_inputs.iter().map(|g| g.attribute));
            for name in names {
                properties.insert(
                    name.to_string(),
                    json!({"value": "number|string", "confidence": "float"}),
                );
            }
        }

        let prompt_text = format!(
            "You are reading a product image of a drone {part_type}. \
             Report each attribute listed in the schema with the value you can read \
             and a confidence between 0 and 1. Use null when the attribute is not visible."
        );

        AttributeSchema {
            prompt_text,
            json_schema: Value::Object(properties),
        }
    }
}

#[async_trait]
impl SchemaGenerator for RegistrySchemaGenerator {
    async fn generate_attribute_schema(
        &self,
        part_type: &str,
    ) -> Result<Option<AttributeSchema>, AdapterError> {
        Ok(Some(Self::schema_for(part_type)))
    }
}
