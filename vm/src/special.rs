use std::collections::HashMap;

use log::info;
use object::{Class, CoreClasses, Heap, Method, Payload, Value, selector_arity};

use crate::primitives::default_primitives;
use crate::{HandlerChain, MESSAGE_TEXT, VM, VmSettings};

/// `(class, selector, primitive)` for every method bootstrap installs.
const CORE_METHODS: &[(&str, &str, &str)] = &[
    ("Object", "==", "object_identical"),
    ("Object", "class", "object_class"),
    ("Object", "printString", "object_print_string"),
    ("Object", "yourself", "object_yourself"),
    ("Boolean", "not", "boolean_not"),
    ("Integer", "+", "integer_add"),
    ("Integer", "-", "integer_sub"),
    ("Integer", "*", "integer_mul"),
    ("Integer", "/", "integer_div"),
    ("Integer", "//", "integer_quo"),
    ("Integer", "\\\\", "integer_mod"),
    ("Integer", "<", "integer_lt"),
    ("Integer", ">", "integer_gt"),
    ("Integer", "<=", "integer_le"),
    ("Integer", ">=", "integer_ge"),
    ("Integer", "=", "integer_eq"),
    ("Integer", "~=", "integer_ne"),
    ("Class", "new", "class_new"),
    ("Class", "new:", "class_new_size"),
    ("Class", "name", "class_name"),
    ("Class", "superclass", "class_superclass"),
    ("String", "size", "string_size"),
    ("String", ",", "string_concat"),
    ("String", "=", "string_eq"),
    ("String", "asSymbol", "string_as_symbol"),
    ("Symbol", "asString", "symbol_as_string"),
    ("Array", "at:", "array_at"),
    ("Array", "at:put:", "array_at_put"),
    ("Array", "size", "array_size"),
    ("Dictionary", "at:", "dictionary_at"),
    ("Dictionary", "at:put:", "dictionary_at_put"),
    ("Dictionary", "size", "dictionary_size"),
    ("Dictionary", "includesKey:", "dictionary_includes_key"),
    ("Block", "value", "block_value"),
    ("Block", "value:", "block_value_1"),
    ("Block", "value:value:", "block_value_2"),
    ("Block", "numArgs", "block_num_args"),
    ("Block", "on:do:", "block_on_do"),
    ("Block", "fixTemps", "block_fix_temps"),
    ("Exception", "signal", "exception_signal"),
    ("Exception", "signal:", "exception_signal_with"),
    ("Exception", "messageText", "exception_message_text"),
];

/// Allocate a core class. `instance_variables` is the complete list,
/// inherited names included.
fn core_class(
    heap: &mut Heap,
    metaclass: Value,
    name: &str,
    superclass: Value,
    instance_variables: &[&str],
) -> Value {
    let names = instance_variables.iter().map(|n| (*n).to_owned()).collect();
    heap.allocate(
        Some(metaclass),
        Payload::Class(Class::new(name, Some(superclass), names)),
    )
}

/// Build a VM: the core class tree, the primitive table and the primitive
/// methods of the core classes.
pub fn bootstrap(settings: VmSettings) -> VM {
    let mut heap = Heap::with_capacity(256);

    // 1. Object and Class: allocated without a class, then patched so both
    //    are instances of Class.
    let object = heap.allocate(None, Payload::Class(Class::new("Object", None, Vec::new())));
    let class = heap.allocate(
        None,
        Payload::Class(Class::new("Class", Some(object), Vec::new())),
    );
    heap.set_class_field(object, class);
    heap.set_class_field(class, class);

    // 2. Classes of immediates.
    let undefined_object = core_class(&mut heap, class, "UndefinedObject", object, &[]);
    let boolean = core_class(&mut heap, class, "Boolean", object, &[]);
    let true_class = core_class(&mut heap, class, "True", boolean, &[]);
    let false_class = core_class(&mut heap, class, "False", boolean, &[]);
    let integer = core_class(&mut heap, class, "Integer", object, &[]);

    // 3. Classes of built-in heap objects. Symbols are strings.
    let string = core_class(&mut heap, class, "String", object, &[]);
    let symbol = core_class(&mut heap, class, "Symbol", string, &[]);
    let array = core_class(&mut heap, class, "Array", object, &[]);
    let dictionary = core_class(&mut heap, class, "Dictionary", object, &[]);
    let block = core_class(&mut heap, class, "Block", object, &[]);
    let method = core_class(&mut heap, class, "Method", object, &[]);

    // 4. Exceptions.
    let exception = core_class(&mut heap, class, "Exception", object, &[MESSAGE_TEXT]);
    let error = core_class(&mut heap, class, "Error", exception, &[MESSAGE_TEXT]);
    let zero_divide = core_class(&mut heap, class, "ZeroDivide", error, &[MESSAGE_TEXT]);

    let specials = CoreClasses {
        object,
        class,
        undefined_object,
        boolean,
        true_class,
        false_class,
        integer,
        string,
        symbol,
        array,
        dictionary,
        block,
        method,
        exception,
        error,
        zero_divide,
    };
    let classes: HashMap<String, Value> = specials
        .named()
        .into_iter()
        .map(|(name, class)| (name.to_owned(), class))
        .collect();

    let mut vm = VM {
        heap,
        specials,
        classes,
        primitives: default_primitives(),
        handlers: HandlerChain::new(),
        frames: Vec::with_capacity(settings.max_depth.min(64)),
        settings,
        next_context_id: 0,
    };

    // 5. Primitive methods.
    for &(class_name, selector, primitive) in CORE_METHODS {
        let (Some(holder), Some(index)) =
            (vm.class_named(class_name), vm.primitive_index(primitive))
        else {
            panic!("bootstrap: cannot install {class_name}>>{selector} ({primitive})");
        };
        let selector_value = vm.intern(selector);
        let mut record = Method::primitive(selector_value, selector_arity(selector), index);
        record.set_class(holder);
        let method = vm
            .heap
            .allocate(Some(vm.specials.method), Payload::Method(record));
        vm.install_method(holder, method);
    }

    info!(
        "bootstrapped {} classes, {} primitives, {} methods",
        vm.classes.len(),
        vm.primitives.len(),
        CORE_METHODS.len()
    );
    vm
}
