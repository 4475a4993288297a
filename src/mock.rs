//! # Mock Type Service
//!
//! Utilities for testing resources and proxies without a server.
//!
//! [`MockService`] implements [`TypeService`] over a queue of expectations.
//! Each call pops the next expectation and panics if it is of a different kind
//! (or targets another id/URL). Every call is recorded, so tests can assert that
//! a cache hit never reached the service.
//!
//! # Example
//! ```ignore
//! let comments = MockService::new();
//! comments
//!     .expect_find_related("/posts/1/comments")
//!     .return_ok(PrimaryData::Collection(vec![comment_payload]));
//!
//! store.register_service("comments", comments.clone());
//! // ... resolve the proxy ...
//! comments.verify(); // Ensures all expectations were met
//! ```

use crate::error::StoreError;
use crate::identifier::Identifier;
use crate::payload::{PrimaryData, ResourceObject};
use crate::schema::RelationMeta;
use crate::service::TypeService;
use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

/// An expected call and the response to hand back.
enum Expectation {
    FindOne {
        id: String,
        response: Result<ResourceObject, StoreError>,
    },
    FindRelated {
        url: String,
        response: Result<PrimaryData, StoreError>,
    },
    Create {
        response: Result<ResourceObject, StoreError>,
    },
    Update {
        response: Result<Option<ResourceObject>, StoreError>,
    },
    Delete {
        id: String,
        response: Result<(), StoreError>,
    },
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    FindOne(String),
    FindRelated { relation: String, url: String },
    Create(ResourceObject),
    Update {
        resource: ResourceObject,
        include_relationships: Vec<String>,
    },
    Delete(Identifier),
}

type Expectations = Rc<RefCell<VecDeque<Expectation>>>;

/// A type service with expectation tracking for fluent testing.
///
/// Clones share their expectations and call log, so a test can keep one
/// handle while the store owns another.
#[derive(Clone, Default)]
pub struct MockService {
    expectations: Expectations,
    calls: Rc<RefCell<Vec<MockCall>>>,
}

impl MockService {
    /// Creates a new mock with no expectations.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_find_one(&self, id: impl ToString) -> FindOneExpectationBuilder {
        FindOneExpectationBuilder {
            id: id.to_string(),
            expectations: self.expectations.clone(),
        }
    }

    pub fn expect_find_related(&self, url: impl Into<String>) -> FindRelatedExpectationBuilder {
        FindRelatedExpectationBuilder {
            url: url.into(),
            expectations: self.expectations.clone(),
        }
    }

    pub fn expect_create(&self) -> CreateExpectationBuilder {
        CreateExpectationBuilder {
            expectations: self.expectations.clone(),
        }
    }

    pub fn expect_update(&self) -> UpdateExpectationBuilder {
        UpdateExpectationBuilder {
            expectations: self.expectations.clone(),
        }
    }

    pub fn expect_delete(&self, id: impl ToString) -> DeleteExpectationBuilder {
        DeleteExpectationBuilder {
            id: id.to_string(),
            expectations: self.expectations.clone(),
        }
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let remaining = self.expectations.borrow().len();
        if remaining > 0 {
            panic!("Not all expectations were met. {} remaining", remaining);
        }
    }

    fn next(&self, call: MockCall) -> Expectation {
        self.calls.borrow_mut().push(call.clone());
        match self.expectations.borrow_mut().pop_front() {
            Some(expectation) => expectation,
            None => panic!("Unexpected request: {:?}", call),
        }
    }
}

#[async_trait(?Send)]
impl TypeService for MockService {
    async fn find_one(&self, id: &str) -> Result<ResourceObject, StoreError> {
        tokio::task::yield_now().await;
        match self.next(MockCall::FindOne(id.to_owned())) {
            Expectation::FindOne { id: expected, response } if expected == id => response,
            _ => panic!("Unexpected request or expectation mismatch: find_one({})", id),
        }
    }

    async fn find_related(&self, relation: &RelationMeta, url: &str) -> Result<PrimaryData, StoreError> {
        let call = MockCall::FindRelated {
            relation: relation.name.clone(),
            url: url.to_owned(),
        };
        let expectation = self.next(call);
        // Suspend once so concurrent resolutions overlap.
        tokio::task::yield_now().await;
        match expectation {
            Expectation::FindRelated { url: expected, response } if expected == url => response,
            _ => panic!("Unexpected request or expectation mismatch: find_related({})", url),
        }
    }

    async fn create_resource(&self, resource: &ResourceObject) -> Result<ResourceObject, StoreError> {
        tokio::task::yield_now().await;
        match self.next(MockCall::Create(resource.clone())) {
            Expectation::Create { response } => response,
            _ => panic!("Unexpected request or expectation mismatch: create_resource"),
        }
    }

    async fn update_resource(
        &self,
        resource: &ResourceObject,
        include_relationships: &[String],
    ) -> Result<Option<ResourceObject>, StoreError> {
        tokio::task::yield_now().await;
        let call = MockCall::Update {
            resource: resource.clone(),
            include_relationships: include_relationships.to_vec(),
        };
        match self.next(call) {
            Expectation::Update { response } => response,
            _ => panic!("Unexpected request or expectation mismatch: update_resource"),
        }
    }

    async fn delete_resource(&self, identifier: &Identifier) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        match self.next(MockCall::Delete(identifier.clone())) {
            Expectation::Delete { id, response } if id == identifier.id => response,
            _ => panic!("Unexpected request or expectation mismatch: delete_resource({})", identifier),
        }
    }
}

/// Builder for `find_one` expectations.
pub struct FindOneExpectationBuilder {
    id: String,
    expectations: Expectations,
}

impl FindOneExpectationBuilder {
    /// Sets the expectation to return a successful result.
    pub fn return_ok(self, payload: ResourceObject) {
        self.expectations.borrow_mut().push_back(Expectation::FindOne {
            id: self.id,
            response: Ok(payload),
        });
    }

    /// Sets the expectation to return an error.
    pub fn return_err(self, error: StoreError) {
        self.expectations.borrow_mut().push_back(Expectation::FindOne {
            id: self.id,
            response: Err(error),
        });
    }
}

/// Builder for `find_related` expectations.
pub struct FindRelatedExpectationBuilder {
    url: String,
    expectations: Expectations,
}

impl FindRelatedExpectationBuilder {
    pub fn return_ok(self, data: PrimaryData) {
        self.expectations.borrow_mut().push_back(Expectation::FindRelated {
            url: self.url,
            response: Ok(data),
        });
    }

    pub fn return_err(self, error: StoreError) {
        self.expectations.borrow_mut().push_back(Expectation::FindRelated {
            url: self.url,
            response: Err(error),
        });
    }
}

/// Builder for `create_resource` expectations.
pub struct CreateExpectationBuilder {
    expectations: Expectations,
}

impl CreateExpectationBuilder {
    pub fn return_ok(self, payload: ResourceObject) {
        self.expectations
            .borrow_mut()
            .push_back(Expectation::Create { response: Ok(payload) });
    }

    pub fn return_err(self, error: StoreError) {
        self.expectations
            .borrow_mut()
            .push_back(Expectation::Create { response: Err(error) });
    }
}

/// Builder for `update_resource` expectations.
pub struct UpdateExpectationBuilder {
    expectations: Expectations,
}

impl UpdateExpectationBuilder {
    /// `None` simulates a server that had nothing to add.
    pub fn return_ok(self, payload: Option<ResourceObject>) {
        self.expectations
            .borrow_mut()
            .push_back(Expectation::Update { response: Ok(payload) });
    }

    pub fn return_err(self, error: StoreError) {
        self.expectations
            .borrow_mut()
            .push_back(Expectation::Update { response: Err(error) });
    }
}

/// Builder for `delete_resource` expectations.
pub struct DeleteExpectationBuilder {
    id: String,
    expectations: Expectations,
}

impl DeleteExpectationBuilder {
    pub fn return_ok(self) {
        self.expectations.borrow_mut().push_back(Expectation::Delete {
            id: self.id,
            response: Ok(()),
        });
    }

    pub fn return_err(self, error: StoreError) {
        self.expectations.borrow_mut().push_back(Expectation::Delete {
            id: self.id,
            response: Err(error),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_service_with_expectations() {
        let mock = MockService::new();
        mock.expect_find_one("1").return_ok(ResourceObject::new("posts", "1"));
        mock.expect_delete("1").return_err(StoreError::Service("offline".into()));

        let found = mock.find_one("1").await.unwrap();
        assert_eq!(found.id.as_deref(), Some("1"));

        let deleted = mock.delete_resource(&Identifier::new("posts", "1")).await;
        assert_eq!(deleted, Err(StoreError::Service("offline".into())));

        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.calls()[0], MockCall::FindOne("1".into()));
        mock.verify();
    }

    #[tokio::test]
    #[should_panic(expected = "Not all expectations were met")]
    async fn test_verify_reports_unmet_expectations() {
        let mock = MockService::new();
        mock.expect_create().return_ok(ResourceObject::new("posts", "1"));
        mock.verify();
    }
}
