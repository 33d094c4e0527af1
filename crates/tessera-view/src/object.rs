//! Object: a parentless array whose elements come from host callbacks.
//!
//! Every fetch and store goes to a [`DynamicSource`]. A fetch that returns
//! [`Value::Undefined`] marks the element masked, and a later defined
//! answer unmasks it again. Object arrays carry an
//! ordinary (entity) mask, since there is no parent mask to mirror.

use std::any::Any;
use std::fmt;

use tessera_arena::{MapContext, Mapping, ViewKind};
use tessera_core::{ArrayError, BuiltinKind, KindTag, Value};

/// Host-side element provider for an Object array.
///
/// Implementations use interior mutability for stores: the arena hands
/// out shared references only.
pub trait DynamicSource {
    /// Read element `addr` (row-major). `Value::Undefined` means masked.
    ///
    /// The answer is not cached: a detached Object asks again on every
    /// fetch and updates the element's mask bit to match.
    fn fetch(&self, addr: usize) -> Result<Value, ArrayError>;

    /// Write element `addr`. Only called when [`writable`](Self::writable)
    /// is true.
    fn store(&self, addr: usize, value: &Value) -> Result<(), ArrayError> {
        let _ = (addr, value);
        Err(ArrayError::Callback {
            reason: "source does not accept stores".into(),
        })
    }

    /// Whether the source accepts stores.
    fn writable(&self) -> bool {
        false
    }
}

/// A [`DynamicSource`] built from closures.
pub struct FnSource<F, S = fn(usize, &Value) -> Result<(), ArrayError>> {
    fetch: F,
    store: Option<S>,
}

impl<F> FnSource<F>
where
    F: Fn(usize) -> Result<Value, ArrayError>,
{
    /// A read-only source.
    pub fn read_only(fetch: F) -> Self {
        Self { fetch, store: None }
    }
}

impl<F, S> FnSource<F, S>
where
    F: Fn(usize) -> Result<Value, ArrayError>,
    S: Fn(usize, &Value) -> Result<(), ArrayError>,
{
    /// A source that accepts stores.
    pub fn read_write(fetch: F, store: S) -> Self {
        Self {
            fetch,
            store: Some(store),
        }
    }
}

impl<F, S> DynamicSource for FnSource<F, S>
where
    F: Fn(usize) -> Result<Value, ArrayError>,
    S: Fn(usize, &Value) -> Result<(), ArrayError>,
{
    fn fetch(&self, addr: usize) -> Result<Value, ArrayError> {
        (self.fetch)(addr)
    }

    fn store(&self, addr: usize, value: &Value) -> Result<(), ArrayError> {
        match &self.store {
            Some(store) => store(addr, value),
            None => Err(ArrayError::Callback {
                reason: "source does not accept stores".into(),
            }),
        }
    }

    fn writable(&self) -> bool {
        self.store.is_some()
    }
}

/// The Object kind: a boxed [`DynamicSource`].
pub struct Object {
    source: Box<dyn DynamicSource>,
}

impl Object {
    /// Wrap a source.
    pub fn new(source: Box<dyn DynamicSource>) -> Self {
        Self { source }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("writable", &self.source.writable())
            .finish_non_exhaustive()
    }
}

impl ViewKind for Object {
    fn tag(&self) -> KindTag {
        BuiltinKind::Object.tag()
    }

    fn mapping(&self) -> Mapping {
        Mapping::Direct
    }

    fn read_only(&self) -> bool {
        !self.source.writable()
    }

    fn fetch_direct(&self, ctx: &MapContext<'_>, addr: usize) -> Result<Value, ArrayError> {
        let value = self.source.fetch(addr)?;
        if value.is_undefined() {
            return Ok(value);
        }
        value.cast_to(ctx.elem)
    }

    fn store_direct(
        &self,
        ctx: &MapContext<'_>,
        addr: usize,
        value: &Value,
    ) -> Result<(), ArrayError> {
        self.source.store(addr, &value.cast_to(ctx.elem)?)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use tessera_arena::{ArrayArena, ViewSpec};
    use tessera_core::{ElementKind, ElementType};

    use super::*;

    fn float64() -> ElementType {
        ElementType::new(ElementKind::Float64)
    }

    #[test]
    fn fetch_goes_to_callback() {
        let arena = ArrayArena::default();
        let source = FnSource::read_only(|addr| Ok(Value::Int(addr as i64 * 10)));
        let id = arena
            .create_view(ViewSpec::new(None, &[3], float64(), Box::new(Object::new(Box::new(source)))))
            .unwrap();
        assert_eq!(arena.fetch(id, 2).unwrap(), Value::Float(20.0));
        assert!(arena.is_read_only(id).unwrap());
        assert!(matches!(
            arena.store(id, 0, &Value::Float(1.0)),
            Err(ArrayError::ReadOnly { .. })
        ));
    }

    #[test]
    fn undefined_fetch_sets_mask() {
        let arena = ArrayArena::default();
        let source = FnSource::read_only(|addr| {
            Ok(if addr == 1 { Value::Undefined } else { Value::Float(1.0) })
        });
        let id = arena
            .create_view(ViewSpec::new(None, &[3], float64(), Box::new(Object::new(Box::new(source)))))
            .unwrap();
        assert_eq!(arena.fetch(id, 1).unwrap(), Value::Undefined);
        assert_eq!(arena.masked_positions(id).unwrap(), vec![1]);
        arena.attach(id).unwrap();
        assert_eq!(arena.fetch(id, 0).unwrap(), Value::Float(1.0));
        arena.detach(id).unwrap();
    }

    #[test]
    fn source_that_becomes_defined_unmasks() {
        let arena = ArrayArena::default();
        let ready = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ready);
        let source = FnSource::read_only(move |_| {
            Ok(if flag.get() { Value::Float(4.0) } else { Value::Undefined })
        });
        let id = arena
            .create_view(ViewSpec::new(None, &[2], float64(), Box::new(Object::new(Box::new(source)))))
            .unwrap();
        assert_eq!(arena.fetch(id, 0).unwrap(), Value::Undefined);
        assert!(arena.is_masked(id, 0).unwrap());
        ready.set(true);
        assert_eq!(arena.fetch(id, 0).unwrap(), Value::Float(4.0));
        assert!(!arena.is_masked(id, 0).unwrap());
        assert_eq!(arena.count_masked(id).unwrap(), 0);
    }

    #[test]
    fn sync_stores_through_callback() {
        let arena = ArrayArena::default();
        let cells = Rc::new(RefCell::new(vec![0.0f64; 3]));
        let (read, write) = (Rc::clone(&cells), Rc::clone(&cells));
        let source = FnSource::read_write(
            move |addr| Ok(Value::Float(read.borrow()[addr])),
            move |addr, value: &Value| {
                write.borrow_mut()[addr] = value.as_f64().unwrap_or(f64::NAN);
                Ok(())
            },
        );
        let id = arena
            .create_view(ViewSpec::new(None, &[3], float64(), Box::new(Object::new(Box::new(source)))))
            .unwrap();
        arena.fill(id, &Value::Float(2.5)).unwrap();
        assert_eq!(*cells.borrow(), vec![2.5; 3]);
        arena.store(id, 1, &Value::Int(7)).unwrap();
        assert_eq!(cells.borrow()[1], 7.0);
    }
}
