//! [`Describe`] and [`Encode`] for standard library types.
//!
//! Primitives encode as single primitive values. Slices and vectors encode as
//! collections whose items are written with `write_value_field`. `Option`,
//! references, `Box`, `Rc`, `Arc` and `RefCell` are transparent: they share
//! the descriptor, identity and strategy of the value they hold, so a cycle
//! running through a smart pointer is recognized as the same object.

use crate::descriptor::{DescriptorCell, GenericDescriptorCell};
use crate::element::PrimitiveKind;
use crate::{Describe, Descriptor, Encode, Error, ObjectId, Primitive, Result, ValueSink};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

macro_rules! impl_primitive {
    ($($ty:ty => $kind:ident;)*) => {$(
        impl Describe for $ty {
            fn describe() -> &'static Descriptor {
                static CELL: DescriptorCell = DescriptorCell::new();
                CELL.get_or_init(|| Descriptor::primitive(PrimitiveKind::$kind))
            }
        }

        impl Encode for $ty {
            fn descriptor(&self) -> &'static Descriptor {
                <$ty as Describe>::describe()
            }

            fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
                sink.encode_primitive(Primitive::from(*self))
            }
        }
    )*};
}

impl_primitive! {
    bool => Bool;
    i8 => I8;
    i16 => I16;
    i32 => I32;
    i64 => I64;
    u8 => I16;
    u16 => I32;
    u32 => I64;
    f32 => F32;
    f64 => F64;
    char => Char;
}

impl Describe for str {
    fn describe() -> &'static Descriptor {
        static CELL: DescriptorCell = DescriptorCell::new();
        CELL.get_or_init(|| Descriptor::primitive(PrimitiveKind::String))
    }
}

impl Encode for str {
    fn descriptor(&self) -> &'static Descriptor {
        str::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        sink.encode_str(self)
    }
}

impl Describe for String {
    fn describe() -> &'static Descriptor {
        str::describe()
    }
}

impl Encode for String {
    fn descriptor(&self) -> &'static Descriptor {
        str::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        sink.encode_str(self)
    }
}

/// Descriptor shared by every primitive of `kind`.
#[must_use]
pub fn primitive_descriptor(kind: PrimitiveKind) -> &'static Descriptor {
    match kind {
        PrimitiveKind::Bool => bool::describe(),
        PrimitiveKind::I8 => i8::describe(),
        PrimitiveKind::I16 => i16::describe(),
        PrimitiveKind::I32 => i32::describe(),
        PrimitiveKind::I64 => i64::describe(),
        PrimitiveKind::F32 => f32::describe(),
        PrimitiveKind::F64 => f64::describe(),
        PrimitiveKind::Char => char::describe(),
        PrimitiveKind::String => str::describe(),
    }
}

impl Encode for Primitive {
    fn descriptor(&self) -> &'static Descriptor {
        primitive_descriptor(self.kind())
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        sink.encode_primitive(self.clone())
    }
}

impl<T: Describe + 'static> Describe for [T] {
    fn describe() -> &'static Descriptor {
        static CELL: GenericDescriptorCell = GenericDescriptorCell::new();
        CELL.get_or_insert::<[T]>(|| {
            let name = format!("Vec<{}>", T::describe().serial_name());
            Descriptor::collection(&name, T::describe)
        })
    }
}

impl<T: Encode + Describe + 'static> Encode for [T] {
    fn descriptor(&self) -> &'static Descriptor {
        <[T]>::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        let descriptor = <[T]>::describe();
        let mut items = sink.begin_collection(descriptor, self.len())?;
        for (index, item) in self.iter().enumerate() {
            items.write_value_field(descriptor, index, item)?;
        }
        items.end_structure(descriptor)
    }
}

impl<T: Describe + 'static> Describe for Vec<T> {
    fn describe() -> &'static Descriptor {
        <[T]>::describe()
    }
}

impl<T: Encode + Describe + 'static> Encode for Vec<T> {
    fn descriptor(&self) -> &'static Descriptor {
        <[T]>::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        self.as_slice().encode(sink)
    }
}

impl<T: Describe> Describe for Option<T> {
    fn describe() -> &'static Descriptor {
        T::describe()
    }
}

impl<T: Encode + Describe> Encode for Option<T> {
    fn descriptor(&self) -> &'static Descriptor {
        match self {
            Some(value) => value.descriptor(),
            None => T::describe(),
        }
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        match self {
            Some(value) => value.encode(sink),
            None => sink.encode_null(),
        }
    }

    fn identity(&self) -> Option<ObjectId> {
        self.as_ref().and_then(Encode::identity)
    }

    fn visible_to(&self, consumer: &str) -> bool {
        self.as_ref().map_or(true, |value| value.visible_to(consumer))
    }
}

macro_rules! impl_transparent {
    ($($pointer:ident),*) => {$(
        impl<T: Describe + ?Sized> Describe for $pointer<T> {
            fn describe() -> &'static Descriptor {
                T::describe()
            }
        }

        impl<T: Encode + ?Sized> Encode for $pointer<T> {
            fn descriptor(&self) -> &'static Descriptor {
                (**self).descriptor()
            }

            fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
                (**self).encode(sink)
            }

            fn identity(&self) -> Option<ObjectId> {
                (**self).identity()
            }

            fn visible_to(&self, consumer: &str) -> bool {
                (**self).visible_to(consumer)
            }
        }
    )*};
}

impl_transparent!(Box, Rc, Arc);

impl<T: Describe + ?Sized> Describe for &T {
    fn describe() -> &'static Descriptor {
        T::describe()
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn descriptor(&self) -> &'static Descriptor {
        (**self).descriptor()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        (**self).encode(sink)
    }

    fn identity(&self) -> Option<ObjectId> {
        (**self).identity()
    }

    fn visible_to(&self, consumer: &str) -> bool {
        (**self).visible_to(consumer)
    }
}

impl<T: Describe> Describe for RefCell<T> {
    fn describe() -> &'static Descriptor {
        T::describe()
    }
}

impl<T: Encode> Encode for RefCell<T> {
    fn descriptor(&self) -> &'static Descriptor {
        match self.try_borrow() {
            Ok(value) => value.descriptor(),
            Err(_) => unborrowable_descriptor(),
        }
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        let value = self
            .try_borrow()
            .map_err(|e| Error::protocol(&format!("value is mutably borrowed during traversal: {}", e)))?;
        value.encode(sink)
    }

    fn identity(&self) -> Option<ObjectId> {
        match self.try_borrow() {
            Ok(value) => value.identity(),
            Err(_) => Some(ObjectId::of(self)),
        }
    }

    fn visible_to(&self, consumer: &str) -> bool {
        self.try_borrow()
            .map_or(true, |value| value.visible_to(consumer))
    }
}

fn unborrowable_descriptor() -> &'static Descriptor {
    static CELL: DescriptorCell = DescriptorCell::new();
    CELL.get_or_init(|| Descriptor::structure("RefCell<?>"))
}
