use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap, HashSet},
};

use crate::{
    host::{Host, JValue},
    Error, Result,
};

/// Classes the mock runtime knows about.
const CLASSES: &[&str] = &[
    "java/lang/Object",
    "java/lang/String",
    "java/lang/Boolean",
    "java/lang/Byte",
    "java/lang/Character",
    "java/lang/Short",
    "java/lang/Integer",
    "java/lang/Long",
    "java/lang/Float",
    "java/lang/Double",
    "java/util/List",
    "jdk/jfr/AnnotationElement",
    "jdk/jfr/ValueDescriptor",
    "jdk/jfr/EventFactory",
    "jdk/jfr/Event",
    "jdk/jfr/Name",
    "jdk/jfr/Label",
    "jdk/jfr/Description",
    "jdk/jfr/Category",
];

const OBJECT_PARAM: &str = "Ljava/lang/Object;";

/// Wrapper class to primitive name, for the static `TYPE` fields.
const PRIMITIVES: &[(&str, &str)] = &[
    ("java/lang/Boolean", "boolean"),
    ("java/lang/Byte", "byte"),
    ("java/lang/Character", "char"),
    ("java/lang/Short", "short"),
    ("java/lang/Integer", "int"),
    ("java/lang/Long", "long"),
    ("java/lang/Float", "float"),
    ("java/lang/Double", "double"),
];

/// A reference handed out by [`MockHost`]; indexes the reference table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MockRef(usize);

/// The methods the mock runtime implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockMethod {
    AnnotationElementInit,
    ValueDescriptorInit,
    ListOf,
    ListOfArray,
    Create,
    NewEvent,
    Set,
    Begin,
    Commit,
}

impl MockMethod {
    fn name(self) -> &'static str {
        match self {
            MockMethod::AnnotationElementInit | MockMethod::ValueDescriptorInit => "<init>",
            MockMethod::ListOf | MockMethod::ListOfArray => "of",
            MockMethod::Create => "create",
            MockMethod::NewEvent => "newEvent",
            MockMethod::Set => "set",
            MockMethod::Begin => "begin",
            MockMethod::Commit => "commit",
        }
    }
}

/// The static fields the mock runtime implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockField {
    BooleanConstant(bool),
    PrimitiveType(&'static str),
}

/// A value as observed in a registered schema or committed event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockValue {
    Bool(bool),
    Str(String),
    Strings(Vec<String>),
    Class(String),
    Other,
}

#[derive(Clone, Debug)]
enum Object {
    Class(String),
    Str(String),
    Bool(bool),
    Array(Vec<Option<usize>>),
    List(Vec<usize>),
    Annotation { type_name: String, value: usize },
    ValueDescriptor { type_name: String, name: String, annotations: usize },
    Factory { fields: usize },
    Event { factory: usize, values: BTreeMap<i32, usize>, begun: bool },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Local,
    Global,
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    object: usize,
    kind: Kind,
    live: bool,
}

/// A field of a registered event type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisteredField {
    pub type_name: String,
    pub name: String,
    pub annotations: Vec<(String, MockValue)>,
}

/// An event type passed to `EventFactory.create`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisteredType {
    pub annotations: Vec<(String, MockValue)>,
    pub fields: Vec<RegisteredField>,
}

/// An event passed to `Event.commit`, with field values keyed by field name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommittedEvent {
    pub values: BTreeMap<String, MockValue>,
    pub begun: bool,
}

impl CommittedEvent {
    pub fn operation(&self) -> Option<&str> {
        match self.values.get("operation") {
            Some(MockValue::Str(value)) => Some(value),
            _ => None,
        }
    }

    pub fn copied(&self) -> Option<bool> {
        match self.values.get("copied") {
            Some(MockValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Default)]
struct State {
    objects: Vec<Object>,
    refs: Vec<Slot>,
    classes: HashMap<String, usize>,
    booleans: HashMap<bool, usize>,
    registered: Option<RegisteredType>,
    committed: Vec<CommittedEvent>,
    violations: Vec<String>,
}

impl State {
    fn alloc(&mut self, object: Object) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    fn local(&mut self, object: usize) -> MockRef {
        self.refs.push(Slot {
            object,
            kind: Kind::Local,
            live: true,
        });
        MockRef(self.refs.len() - 1)
    }

    fn class(&mut self, name: &str) -> usize {
        if let Some(&id) = self.classes.get(name) {
            return id;
        }
        let id = self.alloc(Object::Class(name.to_string()));
        self.classes.insert(name.to_string(), id);
        id
    }

    fn boolean(&mut self, value: bool) -> usize {
        if let Some(&id) = self.booleans.get(&value) {
            return id;
        }
        let id = self.alloc(Object::Bool(value));
        self.booleans.insert(value, id);
        id
    }

    fn resolve(&mut self, reference: MockRef) -> Result<usize> {
        match self.refs.get(reference.0) {
            Some(slot) if slot.live => Ok(slot.object),
            _ => {
                self.violations.push(format!("use of dead reference {:?}", reference));
                Err(Error::Exception(format!("dead reference {:?}", reference)))
            }
        }
    }

    fn class_name(&self, object: usize) -> Option<&str> {
        match &self.objects[object] {
            Object::Class(name) => Some(name),
            _ => None,
        }
    }

    fn value(&self, object: usize) -> MockValue {
        match &self.objects[object] {
            Object::Bool(value) => MockValue::Bool(*value),
            Object::Str(value) => MockValue::Str(value.clone()),
            Object::Class(name) => MockValue::Class(name.clone()),
            Object::Array(items) => {
                let strings: Option<Vec<_>> = items
                    .iter()
                    .map(|item| match item.map(|id| &self.objects[id]) {
                        Some(Object::Str(value)) => Some(value.clone()),
                        _ => None,
                    })
                    .collect();
                strings.map_or(MockValue::Other, MockValue::Strings)
            }
            _ => MockValue::Other,
        }
    }

    fn annotations(&self, list: usize) -> Vec<(String, MockValue)> {
        let Object::List(items) = &self.objects[list] else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|&item| match &self.objects[item] {
                Object::Annotation { type_name, value } => {
                    Some((type_name.clone(), self.value(*value)))
                }
                _ => None,
            })
            .collect()
    }

    fn field_names(&self, factory: usize) -> Vec<String> {
        let Object::Factory { fields, .. } = &self.objects[factory] else {
            return Vec::new();
        };
        let Object::List(items) = &self.objects[*fields] else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|&item| match &self.objects[item] {
                Object::ValueDescriptor { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    fn register(&mut self, annotations: usize, fields: usize) -> Result<RegisteredType> {
        let Object::List(items) = self.objects[fields].clone() else {
            return Err(Error::Exception("EventFactory.create".to_string()));
        };
        let mut registered = Vec::with_capacity(items.len());
        let mut names = HashSet::new();
        for item in items {
            let Object::ValueDescriptor {
                type_name,
                name,
                annotations,
            } = self.objects[item].clone()
            else {
                return Err(Error::Exception("EventFactory.create".to_string()));
            };
            if !names.insert(name.clone()) {
                return Err(Error::Exception(format!("duplicate field {}", name)));
            }
            registered.push(RegisteredField {
                type_name,
                name,
                annotations: self.annotations(annotations),
            });
        }
        Ok(RegisteredType {
            annotations: self.annotations(annotations),
            fields: registered,
        })
    }
}

/// An in-memory [`Host`] modelling the slice of `java.base` and `jdk.jfr` the agent
/// uses.
///
/// Tracks the liveness of every local and global reference it hands out, records the
/// event type registered through `EventFactory.create` and every committed event.
/// Classes and methods can be removed, and calls can be made to throw, to exercise
/// failure paths.
#[derive(Default)]
pub struct MockHost {
    state: RefCell<State>,
    missing_classes: HashSet<String>,
    missing_methods: HashSet<String>,
    failing_calls: HashSet<String>,
    calls: Cell<usize>,
    pending: Cell<bool>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `find_class(name)` fail.
    pub fn without_class(mut self, name: &str) -> Self {
        self.missing_classes.insert(name.to_string());
        self
    }

    /// Makes method lookups of `name` fail.
    pub fn without_method(mut self, name: &str) -> Self {
        self.missing_methods.insert(name.to_string());
        self
    }

    /// Makes every invocation of the method `name` throw.
    pub fn failing(mut self, name: &str) -> Self {
        self.failing_calls.insert(name.to_string());
        self
    }

    /// Leaves an exception pending, as if the application's native code had thrown
    /// before calling into the runtime.
    pub fn raise_exception(&self) {
        self.pending.set(true);
    }

    pub fn clear_exception(&self) {
        self.pending.set(false);
    }

    /// Number of host calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn live_locals(&self) -> usize {
        self.live(Kind::Local)
    }

    pub fn live_globals(&self) -> usize {
        self.live(Kind::Global)
    }

    fn live(&self, kind: Kind) -> usize {
        self.state
            .borrow()
            .refs
            .iter()
            .filter(|slot| slot.live && slot.kind == kind)
            .count()
    }

    /// Misuse observed so far: double deletes, wrong-kind deletes, uses of deleted
    /// references and calls made while an exception is pending.
    pub fn violations(&self) -> Vec<String> {
        self.state.borrow().violations.clone()
    }

    pub fn registered(&self) -> Option<RegisteredType> {
        self.state.borrow().registered.clone()
    }

    pub fn committed(&self) -> Vec<CommittedEvent> {
        self.state.borrow().committed.clone()
    }

    /// The value behind a live reference.
    pub fn value_of(&self, reference: MockRef) -> MockValue {
        let mut state = self.state.borrow_mut();
        match state.resolve(reference) {
            Ok(object) => state.value(object),
            Err(_) => MockValue::Other,
        }
    }

    fn tick(&self) {
        self.calls.set(self.calls.get() + 1);
        if self.pending.get() {
            self.state
                .borrow_mut()
                .violations
                .push("call with an exception pending".to_string());
        }
    }

    fn check_call(&self, method: MockMethod) -> Result<()> {
        if self.failing_calls.contains(method.name()) {
            return Err(Error::Exception(method.name().to_string()));
        }
        Ok(())
    }

    fn objects(state: &mut State, args: &[JValue<MockRef>]) -> Result<Vec<usize>> {
        args.iter()
            .map(|arg| match arg {
                JValue::Object(reference) => state.resolve(*reference),
                other => Err(Error::Exception(format!("expected object, got {:?}", other))),
            })
            .collect()
    }

    fn delete(&self, reference: MockRef, kind: Kind) {
        self.calls.set(self.calls.get() + 1);
        let mut state = self.state.borrow_mut();
        let violation = match state.refs.get_mut(reference.0) {
            Some(slot) if slot.live && slot.kind == kind => {
                slot.live = false;
                None
            }
            Some(slot) if slot.live => Some(format!("{:?} deleted as {:?}", reference, kind)),
            _ => Some(format!("{:?} deleted twice", reference)),
        };
        if let Some(violation) = violation {
            state.violations.push(violation);
        }
    }
}

impl Host for MockHost {
    type Ref = MockRef;
    type MethodId = MockMethod;
    type FieldId = MockField;

    fn find_class(&self, name: &str) -> Result<MockRef> {
        self.tick();
        if self.missing_classes.contains(name) || !CLASSES.contains(&name) {
            return Err(lookup_error!("FindClass({}) failed", name));
        }
        let mut state = self.state.borrow_mut();
        let class = state.class(name);
        Ok(state.local(class))
    }

    fn method_id(&self, class: MockRef, name: &str, signature: &str) -> Result<MockMethod> {
        self.tick();
        let mut state = self.state.borrow_mut();
        let class = state.resolve(class)?;
        let class_name = state.class_name(class).unwrap_or_default();
        let method = match (class_name, name, signature) {
            ("jdk/jfr/AnnotationElement", "<init>", "(Ljava/lang/Class;Ljava/lang/Object;)V") => {
                Some(MockMethod::AnnotationElementInit)
            }
            (
                "jdk/jfr/ValueDescriptor",
                "<init>",
                "(Ljava/lang/Class;Ljava/lang/String;Ljava/util/List;)V",
            ) => Some(MockMethod::ValueDescriptorInit),
            ("jdk/jfr/EventFactory", "newEvent", "()Ljdk/jfr/Event;") => Some(MockMethod::NewEvent),
            ("jdk/jfr/Event", "set", "(ILjava/lang/Object;)V") => Some(MockMethod::Set),
            ("jdk/jfr/Event", "begin", "()V") => Some(MockMethod::Begin),
            ("jdk/jfr/Event", "commit", "()V") => Some(MockMethod::Commit),
            _ => None,
        };
        method
            .filter(|method| !self.missing_methods.contains(method.name()))
            .ok_or_else(|| lookup_error!("GetMethodID({}{}) failed", name, signature))
    }

    fn static_method_id(&self, class: MockRef, name: &str, signature: &str) -> Result<MockMethod> {
        self.tick();
        let mut state = self.state.borrow_mut();
        let class = state.resolve(class)?;
        let class_name = state.class_name(class).unwrap_or_default();
        let fixed_arity = signature
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(")Ljava/util/List;"))
            .is_some_and(|params| {
                let arity = params.len() / OBJECT_PARAM.len();
                arity <= 10 && params == OBJECT_PARAM.repeat(arity)
            });
        let method = match (class_name, name) {
            ("java/util/List", "of") if fixed_arity => Some(MockMethod::ListOf),
            ("java/util/List", "of") if signature == "([Ljava/lang/Object;)Ljava/util/List;" => {
                Some(MockMethod::ListOfArray)
            }
            ("jdk/jfr/EventFactory", "create")
                if signature == "(Ljava/util/List;Ljava/util/List;)Ljdk/jfr/EventFactory;" =>
            {
                Some(MockMethod::Create)
            }
            _ => None,
        };
        method
            .filter(|method| !self.missing_methods.contains(method.name()))
            .ok_or_else(|| lookup_error!("GetStaticMethodID({}{}) failed", name, signature))
    }

    fn static_field_id(&self, class: MockRef, name: &str, signature: &str) -> Result<MockField> {
        self.tick();
        let mut state = self.state.borrow_mut();
        let class = state.resolve(class)?;
        let class_name = state.class_name(class).unwrap_or_default();
        let primitive = PRIMITIVES
            .iter()
            .find(|(wrapper, _)| *wrapper == class_name)
            .map(|(_, primitive)| *primitive);
        match (class_name, name, signature, primitive) {
            ("java/lang/Boolean", "TRUE", "Ljava/lang/Boolean;", _) => {
                Ok(MockField::BooleanConstant(true))
            }
            ("java/lang/Boolean", "FALSE", "Ljava/lang/Boolean;", _) => {
                Ok(MockField::BooleanConstant(false))
            }
            (_, "TYPE", "Ljava/lang/Class;", Some(primitive)) => {
                Ok(MockField::PrimitiveType(primitive))
            }
            _ => Err(lookup_error!("GetStaticFieldID({}#{}) failed", name, signature)),
        }
    }

    fn static_object_field(&self, class: MockRef, field: MockField) -> Result<MockRef> {
        self.tick();
        let mut state = self.state.borrow_mut();
        state.resolve(class)?;
        let object = match field {
            MockField::BooleanConstant(value) => state.boolean(value),
            MockField::PrimitiveType(primitive) => state.class(primitive),
        };
        Ok(state.local(object))
    }

    fn new_string(&self, value: &str) -> Result<MockRef> {
        self.tick();
        let mut state = self.state.borrow_mut();
        let string = state.alloc(Object::Str(value.to_string()));
        Ok(state.local(string))
    }

    fn new_object_array(&self, len: usize, element_class: MockRef) -> Result<MockRef> {
        self.tick();
        let mut state = self.state.borrow_mut();
        state.resolve(element_class)?;
        let array = state.alloc(Object::Array(vec![None; len]));
        Ok(state.local(array))
    }

    fn set_object_array_element(&self, array: MockRef, index: usize, value: MockRef) -> Result<()> {
        self.tick();
        let mut state = self.state.borrow_mut();
        let array = state.resolve(array)?;
        let value = state.resolve(value)?;
        match &mut state.objects[array] {
            Object::Array(items) if index < items.len() => {
                items[index] = Some(value);
                Ok(())
            }
            _ => Err(construction_error!("SetObjectArrayElement({}) failed", index)),
        }
    }

    fn new_object(
        &self,
        class: MockRef,
        constructor: MockMethod,
        args: &[JValue<MockRef>],
    ) -> Result<MockRef> {
        self.tick();
        let mut state = self.state.borrow_mut();
        state.resolve(class)?;
        let args = Self::objects(&mut state, args)?;
        let object = match (constructor, args.as_slice()) {
            (MockMethod::AnnotationElementInit, &[annotation_type, value]) => {
                let type_name = state
                    .class_name(annotation_type)
                    .ok_or_else(|| construction_error!("annotation type is not a class"))?
                    .to_string();
                Object::Annotation { type_name, value }
            }
            (MockMethod::ValueDescriptorInit, &[field_type, name, annotations]) => {
                let type_name = state
                    .class_name(field_type)
                    .ok_or_else(|| construction_error!("field type is not a class"))?
                    .to_string();
                let Object::Str(name) = state.objects[name].clone() else {
                    return Err(construction_error!("field name is not a string"));
                };
                Object::ValueDescriptor {
                    type_name,
                    name,
                    annotations,
                }
            }
            _ => return Err(construction_error!("NewObject({:?}) failed", constructor)),
        };
        let object = state.alloc(object);
        Ok(state.local(object))
    }

    fn call_static_object_method(
        &self,
        class: MockRef,
        method: MockMethod,
        args: &[JValue<MockRef>],
    ) -> Result<MockRef> {
        self.tick();
        self.check_call(method)?;
        let mut state = self.state.borrow_mut();
        state.resolve(class)?;
        let args = Self::objects(&mut state, args)?;
        let object = match (method, args.as_slice()) {
            (MockMethod::ListOf, elements) => Object::List(elements.to_vec()),
            (MockMethod::ListOfArray, &[array]) => match &state.objects[array] {
                Object::Array(items) => Object::List(items.iter().flatten().copied().collect()),
                _ => return Err(Error::Exception("List.of".to_string())),
            },
            (MockMethod::Create, &[annotations, fields]) => {
                let registered = state.register(annotations, fields)?;
                state.registered = Some(registered);
                Object::Factory { fields }
            }
            _ => return Err(Error::Exception(format!("{:?}", method))),
        };
        let object = state.alloc(object);
        Ok(state.local(object))
    }

    fn call_object_method(
        &self,
        object: MockRef,
        method: MockMethod,
        args: &[JValue<MockRef>],
    ) -> Result<MockRef> {
        self.tick();
        self.check_call(method)?;
        let mut state = self.state.borrow_mut();
        let receiver = state.resolve(object)?;
        let is_factory = matches!(state.objects[receiver], Object::Factory { .. });
        if !is_factory || method != MockMethod::NewEvent || !args.is_empty() {
            return Err(Error::Exception(format!("{:?}", method)));
        }
        let event = state.alloc(Object::Event {
            factory: receiver,
            values: BTreeMap::new(),
            begun: false,
        });
        Ok(state.local(event))
    }

    fn call_void_method(
        &self,
        object: MockRef,
        method: MockMethod,
        args: &[JValue<MockRef>],
    ) -> Result<()> {
        self.tick();
        self.check_call(method)?;
        let mut state = self.state.borrow_mut();
        let receiver = state.resolve(object)?;
        let value = match args {
            [JValue::Int(_), JValue::Object(value)] => Some(state.resolve(*value)?),
            _ => None,
        };

        let committed = match (&mut state.objects[receiver], method, args, value) {
            (Object::Event { values, .. }, MockMethod::Set, [JValue::Int(index), _], Some(value)) => {
                values.insert(*index, value);
                None
            }
            (Object::Event { begun, .. }, MockMethod::Begin, [], _) => {
                *begun = true;
                None
            }
            (
                Object::Event {
                    factory,
                    values,
                    begun,
                },
                MockMethod::Commit,
                [],
                _,
            ) => Some((*factory, values.clone(), *begun)),
            _ => return Err(Error::Exception(format!("{:?}", method))),
        };

        if let Some((factory, values, begun)) = committed {
            let names = state.field_names(factory);
            let values = values
                .into_iter()
                .filter_map(|(index, value)| {
                    let name = names.get(usize::try_from(index).ok()?)?;
                    Some((name.clone(), state.value(value)))
                })
                .collect();
            state.committed.push(CommittedEvent { values, begun });
        }
        Ok(())
    }

    fn new_global_ref(&self, object: MockRef) -> Result<MockRef> {
        self.tick();
        let mut state = self.state.borrow_mut();
        let object = state.resolve(object)?;
        state.refs.push(Slot {
            object,
            kind: Kind::Global,
            live: true,
        });
        Ok(MockRef(state.refs.len() - 1))
    }

    fn delete_local_ref(&self, object: MockRef) {
        self.delete(object, Kind::Local);
    }

    fn delete_global_ref(&self, object: MockRef) {
        self.delete(object, Kind::Global);
    }

    fn exception_pending(&self) -> bool {
        self.pending.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_tracking() {
        let host = MockHost::new();
        let string = host.new_string("x").unwrap();
        let global = host.new_global_ref(string).unwrap();
        assert_eq!(host.live_locals(), 1);
        assert_eq!(host.live_globals(), 1);

        host.delete_local_ref(string);
        assert_eq!(host.value_of(global), MockValue::Str("x".to_string()));
        host.delete_global_ref(global);
        assert!(host.violations().is_empty());

        host.delete_global_ref(global);
        assert_eq!(host.violations().len(), 1);
    }

    #[test]
    fn test_pending_exception_permits_only_deletes() {
        let host = MockHost::new();
        let string = host.new_string("x").unwrap();
        host.raise_exception();
        assert!(host.exception_pending());

        host.delete_local_ref(string);
        assert!(host.violations().is_empty());

        host.new_string("y").unwrap();
        assert_eq!(host.violations().len(), 1);
        host.clear_exception();
        assert!(!host.exception_pending());
    }

    #[test]
    fn test_missing_class() {
        let host = MockHost::new().without_class("jdk/jfr/Event");
        assert!(matches!(host.find_class("jdk/jfr/Event"), Err(Error::Lookup(_))));
        assert!(matches!(host.find_class("com/example/Unknown"), Err(Error::Lookup(_))));
        assert!(host.find_class("java/util/List").is_ok());
    }
}
