use std::ffi::{CStr, c_char};

use dyntype::{
    TypeDescriptor, ValueCell, VirtualHeap,
    codec::{PortableValue, decode_envelope, encode_envelope},
    native_struct,
    types::primitives,
};

fn hello_struct() -> (ValueCell, VirtualHeap) {
    let mut heap = VirtualHeap::new();
    // SAFETY: The literal is NUL-terminated
    let text = unsafe {
        heap.register(c"hello".as_ptr().cast(), &primitives::u8())
            .unwrap()
    };

    let value = ValueCell::from_struct([
        ValueCell::from(1i32),
        ValueCell::from(2.4f32),
        ValueCell::from_struct([text, ValueCell::from(5i32)]),
    ]);

    (value, heap)
}

#[test]
fn struct_with_string_survives_the_envelope() {
    let (value, heap) = hello_struct();
    assert_eq!(
        &TypeDescriptor::struct_of([
            primitives::i32(),
            primitives::f32(),
            TypeDescriptor::struct_of([primitives::str(), primitives::i32()]),
        ]),
        value.r#type()
    );

    let encoded = encode_envelope(&value, &heap);
    let decoded = decode_envelope(&encoded).unwrap();
    let (value, heap) = decoded.into_parts();

    assert_eq!(1, value.field(0).unwrap().as_native::<i32>(&heap).unwrap());
    assert!((value.field(1).unwrap().as_native::<f32>(&heap).unwrap() - 2.4).abs() < 1e-6);

    let inner = value.field(2).unwrap();
    assert_eq!(5, inner.field(1).unwrap().as_native::<i32>(&heap).unwrap());

    let pointer = inner.field(0).unwrap();
    let offset = usize::from_le_bytes(pointer.bytes().try_into().unwrap());
    assert_eq!(Some(&b"hello\0"[..]), heap.read(offset, 6));

    let address = pointer.as_native::<usize>(&heap).unwrap();
    // SAFETY: The address was resolved against `heap`, which has not grown since
    let text = unsafe { CStr::from_ptr(std::ptr::with_exposed_provenance::<c_char>(address)) };
    assert_eq!(c"hello", text);
}

#[test]
fn envelope_encoding_is_stable_across_fresh_heaps() {
    let (first_value, first_heap) = hello_struct();
    let (second_value, second_heap) = hello_struct();

    assert_eq!(
        encode_envelope(&first_value, &first_heap),
        encode_envelope(&second_value, &second_heap)
    );
}

#[test]
fn decoded_envelopes_encode_to_the_same_bytes() {
    let (value, heap) = hello_struct();

    let first = encode_envelope(&value, &heap);
    let second = PortableValue::decode(&first).unwrap().encode();

    assert_eq!(first, second);
}

#[test]
fn decoded_pointers_can_be_registered_again() {
    let (value, heap) = hello_struct();
    let decoded = decode_envelope(&encode_envelope(&value, &heap)).unwrap();
    let (value, mut heap) = decoded.into_parts();

    let pointer = heap.register_cell(&value.field(2).unwrap().field(0).unwrap());

    assert_eq!(2, pointer.r#type().indirection_depth());
    assert_eq!(6 + size_of::<usize>(), heap.len());
}

#[test]
fn resolving_twice_gives_the_same_address() {
    let (value, heap) = hello_struct();
    let pointer = value.field(2).unwrap().field(0).unwrap();

    let once = pointer.resolve_pointer(&heap).unwrap();
    let twice = once.resolve_pointer(&heap).unwrap();

    assert!(once.r#type().is_relocated());
    assert_eq!(once.bytes(), twice.bytes());
    assert_eq!(heap.base_address(), once.as_native::<usize>(&heap).unwrap());
}

#[test]
fn registered_strings_include_the_terminator() {
    let mut heap = VirtualHeap::new();
    // SAFETY: The literal is NUL-terminated
    let pointer = unsafe { heap.register(c"hi".as_ptr().cast(), &primitives::u8()).unwrap() };

    assert_eq!(3, heap.len());
    assert_eq!(&primitives::str(), pointer.r#type());
    assert_eq!(&0usize.to_le_bytes(), pointer.bytes());
}

#[native_struct]
#[repr(C, packed)]
#[derive(Clone, Copy)]
struct Inner {
    text: *const c_char,
    a: i32,
}

#[native_struct]
#[repr(C, packed)]
#[derive(Clone, Copy)]
struct Outer {
    a: i32,
    b: f32,
    inner: Inner,
}

#[test]
fn native_structs_are_captured_and_reinterpreted() {
    let original = Outer {
        a: 1,
        b: 2.4,
        inner: Inner {
            text: c"hello".as_ptr(),
            a: 5,
        },
    };

    // SAFETY: `Outer` is packed and its string is NUL-terminated
    let captured = unsafe { PortableValue::capture(&original).unwrap() };
    assert_eq!(hello_struct().0.r#type(), captured.value().r#type());

    let decoded = PortableValue::decode(&captured.encode()).unwrap();
    // SAFETY: Any bit pattern is a valid `Outer`, and `decoded` outlives the pointer
    let restored = unsafe { decoded.value().reinterpret::<Outer>(decoded.heap()).unwrap() };

    let (a, b, inner) = (restored.a, restored.b, restored.inner);
    let (text, inner_a) = (inner.text, inner.a);

    assert_eq!(1, a);
    assert!((b - 2.4).abs() < 1e-6);
    assert_eq!(5, inner_a);
    // SAFETY: `text` points into the decoded heap
    assert_eq!(c"hello", unsafe { CStr::from_ptr(text) });
}
