use crate::error::StoreError;
use crate::proxy::RelatedProxy;
use crate::resource::Resource;
use crate::schema::{AttrType, ModelDefinition, RelationMeta, ResourceModel};

/// Author of posts.
#[derive(Debug, Clone, PartialEq)]
pub struct Author {
    resource: Resource,
}

impl ResourceModel for Author {
    const TYPE: &'static str = "authors";

    fn definition() -> ModelDefinition {
        ModelDefinition::new(Self::TYPE)
            .attr("name", AttrType::String)
            .relation(RelationMeta::to_many("posts", "posts").with_inverse("author"))
    }

    fn from_resource(resource: Resource) -> Self {
        Self { resource }
    }

    fn resource(&self) -> &Resource {
        &self.resource
    }
}

impl Author {
    pub fn name(&self) -> Option<String> {
        self.resource.attr("name")
    }

    pub fn set_name(&self, name: impl Into<String>) -> Result<(), StoreError> {
        self.resource.set_attribute("name", name.into())
    }

    pub fn posts(&self) -> Result<RelatedProxy, StoreError> {
        self.resource.related("posts")
    }
}
