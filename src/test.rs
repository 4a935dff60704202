//! Shared functionality which is used in unit-tests across the crate.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::host::{HostClass, HostObject, HostValue, MemberHandle};
use crate::{Error, Result};

type Behavior = Box<dyn Fn(&[HostValue]) -> HostValue + Send + Sync>;

/// A scriptable host object for tests: method behaviors keyed by
/// `"name descriptor"`, fields as plain storage.
pub(crate) struct FakeObject {
    class: Arc<HostClass>,
    methods: HashMap<String, Behavior>,
    fields: DashMap<String, HostValue>,
}

impl FakeObject {
    pub(crate) fn new(class: Arc<HostClass>) -> FakeObject {
        FakeObject {
            class,
            methods: HashMap::new(),
            fields: DashMap::new(),
        }
    }

    /// An object of a memberless root class.
    pub(crate) fn plain(class_name: &str) -> FakeObject {
        FakeObject::new(HostClass::root(class_name))
    }

    /// Scripts a method behavior. The member must also be declared on the
    /// class for the locator to find it.
    pub(crate) fn with_method<F>(mut self, name: &str, desc: &str, behavior: F) -> FakeObject
    where
        F: Fn(&[HostValue]) -> HostValue + Send + Sync + 'static,
    {
        self.methods.insert(format!("{name} {desc}"), Box::new(behavior));
        self
    }

    /// Seeds a field value.
    pub(crate) fn with_field(self, name: &str, value: HostValue) -> FakeObject {
        self.fields.insert(name.to_string(), value);
        self
    }
}

impl HostObject for FakeObject {
    fn class(&self) -> Arc<HostClass> {
        self.class.clone()
    }

    fn call(&self, member: &MemberHandle, args: &[HostValue]) -> Result<HostValue> {
        let declared = member.member().ok_or_else(|| Error::InvocationFailure {
            class: self.class.name().to_string(),
            operation: "call".to_string(),
            message: "dangling member handle".to_string(),
        })?;
        let key = format!("{} {}", declared.name, declared.desc);
        match self.methods.get(&key) {
            Some(behavior) => Ok(behavior(args)),
            None => Err(Error::InvocationFailure {
                class: self.class.name().to_string(),
                operation: key,
                message: "no scripted behavior".to_string(),
            }),
        }
    }

    fn get(&self, member: &MemberHandle) -> Result<HostValue> {
        let declared = member.member().ok_or_else(|| Error::InvocationFailure {
            class: self.class.name().to_string(),
            operation: "get".to_string(),
            message: "dangling member handle".to_string(),
        })?;
        self.fields
            .get(&declared.name)
            .map(|value| value.value().clone())
            .ok_or_else(|| Error::InvocationFailure {
                class: self.class.name().to_string(),
                operation: declared.name.clone(),
                message: "field has no value".to_string(),
            })
    }

    fn set(&self, member: &MemberHandle, value: HostValue) -> Result<()> {
        let declared = member.member().ok_or_else(|| Error::InvocationFailure {
            class: self.class.name().to_string(),
            operation: "set".to_string(),
            message: "dangling member handle".to_string(),
        })?;
        self.fields.insert(declared.name.clone(), value);
        Ok(())
    }
}
