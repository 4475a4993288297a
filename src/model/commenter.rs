use crate::error::StoreError;
use crate::proxy::RelatedProxy;
use crate::resource::Resource;
use crate::schema::{AttrType, ModelDefinition, RelationMeta, ResourceModel};

/// Someone who comments. The email address is assigned by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Commenter {
    resource: Resource,
}

impl ResourceModel for Commenter {
    const TYPE: &'static str = "commenters";

    fn definition() -> ModelDefinition {
        ModelDefinition::new(Self::TYPE)
            .attr("name", AttrType::String)
            .immutable_attr("email", AttrType::String)
            .relation(RelationMeta::to_many("comments", "comments").with_inverse("commenter"))
    }

    fn from_resource(resource: Resource) -> Self {
        Self { resource }
    }

    fn resource(&self) -> &Resource {
        &self.resource
    }
}

impl Commenter {
    pub fn name(&self) -> Option<String> {
        self.resource.attr("name")
    }

    pub fn set_name(&self, name: impl Into<String>) -> Result<(), StoreError> {
        self.resource.set_attribute("name", name.into())
    }

    pub fn email(&self) -> Option<String> {
        self.resource.attr("email")
    }

    pub fn comments(&self) -> Result<RelatedProxy, StoreError> {
        self.resource.related("comments")
    }
}
