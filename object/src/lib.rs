mod value;
mod header;
mod heap;
mod lookup;
mod method_dictionary;
mod objects;
mod special;

pub use value::{ObjRef, Value};
pub use header::{Header, HeaderFlags, ObjectType};
pub use heap::{Heap, HeapObject};
pub use lookup::{LookupResult, inherits_from, is_instance_of, lookup, lookup_in_class};
pub use method_dictionary::MethodDictionary;
pub use objects::{
    Block, Class, ContextId, Instance, Method, Payload, selector_arity,
};
pub use special::CoreClasses;
