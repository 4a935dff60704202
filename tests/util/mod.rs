//! Shared builders for integration tests: a scriptable host object and
//! class-blob construction helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use hostgraft::prelude::*;

type Behavior = Box<dyn Fn(&[HostValue]) -> HostValue + Send + Sync>;

/// A scriptable host object: method behaviors keyed by `"name descriptor"`,
/// fields as plain storage readable back by tests.
pub struct FakeObject {
    class: Arc<HostClass>,
    methods: HashMap<String, Behavior>,
    fields: dashmap::DashMap<String, HostValue>,
}

impl FakeObject {
    pub fn new(class: Arc<HostClass>) -> FakeObject {
        FakeObject {
            class,
            methods: HashMap::new(),
            fields: dashmap::DashMap::new(),
        }
    }

    pub fn with_method<F>(mut self, name: &str, desc: &str, behavior: F) -> FakeObject
    where
        F: Fn(&[HostValue]) -> HostValue + Send + Sync + 'static,
    {
        self.methods.insert(format!("{name} {desc}"), Box::new(behavior));
        self
    }

    pub fn with_field(self, name: &str, value: HostValue) -> FakeObject {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Reads a field back, as tests do after a hook mutated it.
    pub fn field(&self, name: &str) -> Option<HostValue> {
        self.fields.get(name).map(|value| value.value().clone())
    }
}

impl HostObject for FakeObject {
    fn class(&self) -> Arc<HostClass> {
        self.class.clone()
    }

    fn call(&self, member: &hostgraft::host::MemberHandle, args: &[HostValue]) -> Result<HostValue> {
        let declared = member.member().expect("dangling member handle");
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

    fn get(&self, member: &hostgraft::host::MemberHandle) -> Result<HostValue> {
        let declared = member.member().expect("dangling member handle");
        self.fields
            .get(&declared.name)
            .map(|value| value.value().clone())
            .ok_or_else(|| Error::InvocationFailure {
                class: self.class.name().to_string(),
                operation: declared.name.clone(),
                message: "field has no value".to_string(),
            })
    }

    fn set(&self, member: &hostgraft::host::MemberHandle, value: HostValue) -> Result<()> {
        let declared = member.member().expect("dangling member handle");
        self.fields.insert(declared.name.clone(), value);
        Ok(())
    }
}

/// Builds a method whose body is the given index-form instruction list.
pub fn method_of(name: &str, desc: &str, flags: MemberFlags, max_locals: u16, ops: &[Op]) -> Method {
    let mut method = Method {
        flags,
        name: name.to_string(),
        desc: MethodDesc::parse(desc).expect("valid descriptor"),
        max_stack: 8,
        max_locals,
        code: Vec::new(),
        exceptions: Vec::new(),
    };
    CodeEditor::from_parts(ops.to_vec(), Vec::new())
        .store(&mut method)
        .expect("encodable body");
    method
}

/// Builds a minimal public class blob around the given methods.
pub fn class_of(name: &str, superclass: Option<&str>, methods: Vec<Method>) -> ClassFile {
    ClassFile {
        flags: hostgraft::class::ClassFlags::PUBLIC,
        name: name.to_string(),
        superclass: superclass.map(ToString::to_string),
        interfaces: Vec::new(),
        pool: hostgraft::class::ConstantPool::new(),
        fields: Vec::new(),
        methods,
    }
}

/// The entity class chain the pinned profile classifies against:
/// `ce <- cq <- axg`, with a concrete subclass on the end.
pub fn player_class(concrete: &str) -> Arc<HostClass> {
    let entity = HostClass::root("ce");
    let living = HostClass::new("cq", Some(entity), Vec::new());
    let player = HostClass::new("axg", Some(living), Vec::new());
    HostClass::new(concrete, Some(player), Vec::new())
}

/// A context over the pinned profile with the given handshake policy.
pub fn pinned_context(require_compatible: bool) -> Arc<GraftContext> {
    GraftContext::new(
        HostProfile::pinned(),
        HandshakeTable::new(require_compatible, "0.1.0"),
    )
}
