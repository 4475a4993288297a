use crate::error::StoreError;
use crate::proxy::RelatedProxy;
use crate::resource::Resource;
use crate::schema::{AttrType, ModelDefinition, RelationMeta, ResourceModel};

/// A blog post.
///
/// # Relations
/// - `author`: to-one `authors`, inverse `posts`
/// - `comments`: to-many `comments`, inverse `post`
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    resource: Resource,
}

impl ResourceModel for Post {
    const TYPE: &'static str = "posts";

    fn definition() -> ModelDefinition {
        ModelDefinition::new(Self::TYPE)
            .attr("title", AttrType::String)
            .attr("excerpt", AttrType::String)
            .attr("date", AttrType::Date)
            .relation(RelationMeta::to_one("author", "authors").with_inverse("posts"))
            .relation(RelationMeta::to_many("comments", "comments").with_inverse("post"))
    }

    fn from_resource(resource: Resource) -> Self {
        Self { resource }
    }

    fn resource(&self) -> &Resource {
        &self.resource
    }
}

impl Post {
    pub fn title(&self) -> Option<String> {
        self.resource.attr("title")
    }

    pub fn set_title(&self, title: impl Into<String>) -> Result<(), StoreError> {
        self.resource.set_attribute("title", title.into())
    }

    pub fn excerpt(&self) -> Option<String> {
        self.resource.attr("excerpt")
    }

    pub fn set_excerpt(&self, excerpt: impl Into<String>) -> Result<(), StoreError> {
        self.resource.set_attribute("excerpt", excerpt.into())
    }

    /// Publication date as sent by the server.
    pub fn date(&self) -> Option<String> {
        self.resource.attr("date")
    }

    pub fn author(&self) -> Result<RelatedProxy, StoreError> {
        self.resource.related("author")
    }

    pub fn comments(&self) -> Result<RelatedProxy, StoreError> {
        self.resource.related("comments")
    }
}
