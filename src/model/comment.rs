use crate::error::StoreError;
use crate::proxy::RelatedProxy;
use crate::resource::Resource;
use crate::schema::{AttrType, ModelDefinition, RelationMeta, ResourceModel};

/// A comment on a post, written by a commenter.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    resource: Resource,
}

impl ResourceModel for Comment {
    const TYPE: &'static str = "comments";

    fn definition() -> ModelDefinition {
        ModelDefinition::new(Self::TYPE)
            .attr("body", AttrType::String)
            .relation(RelationMeta::to_one("post", "posts").with_inverse("comments"))
            .relation(RelationMeta::to_one("commenter", "commenters").with_inverse("comments"))
    }

    fn from_resource(resource: Resource) -> Self {
        Self { resource }
    }

    fn resource(&self) -> &Resource {
        &self.resource
    }
}

impl Comment {
    pub fn body(&self) -> Option<String> {
        self.resource.attr("body")
    }

    pub fn set_body(&self, body: impl Into<String>) -> Result<(), StoreError> {
        self.resource.set_attribute("body", body.into())
    }

    pub fn post(&self) -> Result<RelatedProxy, StoreError> {
        self.resource.related("post")
    }

    pub fn commenter(&self) -> Result<RelatedProxy, StoreError> {
        self.resource.related("commenter")
    }
}
