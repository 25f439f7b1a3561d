//! Recording host used by the unit tests in this crate.
//!
//! Views copy their buffer (aliasing is exercised by `dae-bridge-heap`);
//! what this host checks is the order and balance of host operations.

use std::collections::HashMap;

use crate::buffer::RawBuffer;
use crate::error::HostError;
use crate::host::HostRuntime;

type MockFn = Box<dyn Fn(&[Vec<f64>; 3]) -> Result<Vec<f64>, String>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MockEvent {
    Materialize(usize),
    Repoint(usize),
    Retire(usize),
    Pin(usize),
    Unpin(usize),
    Persist(usize),
    Release(usize),
    Call(usize),
}

enum Obj {
    Array(Vec<f64>),
    View { data: Vec<f64>, retired: bool },
    Function(MockFn),
    Text,
}

struct Slot {
    obj: Obj,
    pins: u32,
}

pub(crate) struct MockHost {
    slots: Vec<Slot>,
    names: HashMap<String, usize>,
    events: Vec<MockEvent>,
    pub(crate) reuse: bool,
}

impl MockHost {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            names: HashMap::new(),
            events: Vec::new(),
            reuse: true,
        }
    }

    fn push(&mut self, obj: Obj) -> usize {
        self.slots.push(Slot { obj, pins: 0 });
        self.slots.len() - 1
    }

    pub(crate) fn alloc(&mut self, data: Vec<f64>) -> usize {
        self.push(Obj::Array(data))
    }

    /// A value that is neither callable nor an array.
    pub(crate) fn text(&mut self) -> usize {
        self.push(Obj::Text)
    }

    pub(crate) fn function(
        &mut self,
        f: impl Fn(&[Vec<f64>; 3]) -> Result<Vec<f64>, String> + 'static,
    ) -> usize {
        self.push(Obj::Function(Box::new(f)))
    }

    pub(crate) fn define(&mut self, name: &str, value: usize) {
        self.names.insert(name.to_owned(), value);
    }

    pub(crate) fn events(&self) -> &[MockEvent] {
        &self.events
    }

    pub(crate) fn clear_events(&mut self) {
        self.events.clear();
    }

    pub(crate) fn pin_count(&self, r: usize) -> u32 {
        self.slots[r].pins
    }

    pub(crate) fn total_pins(&self) -> u32 {
        self.slots.iter().map(|s| s.pins).sum()
    }

    fn data(&self, r: usize) -> Result<&[f64], HostError> {
        match &self.slots[r].obj {
            Obj::Array(d) => Ok(d.as_slice()),
            Obj::View { retired: true, .. } => Err(HostError::RetiredView),
            Obj::View { data, .. } => Ok(data.as_slice()),
            Obj::Function(_) => Err(HostError::NotF64Array {
                found: "function".into(),
            }),
            Obj::Text => Err(HostError::NotF64Array {
                found: "text".into(),
            }),
        }
    }
}

#[allow(unsafe_code)]
impl HostRuntime for MockHost {
    type Ref = usize;
    type Handle = usize;

    const SUPPORTS_REUSE: bool = true;

    fn resolve(&mut self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    fn is_callable(&self, value: &usize) -> bool {
        matches!(self.slots[*value].obj, Obj::Function(_))
    }

    fn type_name(&self, value: &usize) -> String {
        match self.slots[*value].obj {
            Obj::Array(_) => "array",
            Obj::View { .. } => "view",
            Obj::Function(_) => "function",
            Obj::Text => "text",
        }
        .to_owned()
    }

    unsafe fn materialize(&mut self, buffer: RawBuffer<'_>) -> Result<usize, HostError> {
        let r = self.push(Obj::View {
            data: buffer.as_slice().to_vec(),
            retired: false,
        });
        self.events.push(MockEvent::Materialize(r));
        Ok(r)
    }

    unsafe fn repoint(&mut self, view: &usize, buffer: RawBuffer<'_>) -> Result<(), HostError> {
        if !self.reuse {
            return Err(HostError::Unsupported("view reuse"));
        }
        self.slots[*view].obj = Obj::View {
            data: buffer.as_slice().to_vec(),
            retired: false,
        };
        self.events.push(MockEvent::Repoint(*view));
        Ok(())
    }

    fn retire(&mut self, view: &usize) {
        if let Obj::View { data, retired } = &mut self.slots[*view].obj {
            data.clear();
            *retired = true;
        }
        self.events.push(MockEvent::Retire(*view));
    }

    fn pin(&mut self, value: &usize) {
        self.slots[*value].pins += 1;
        self.events.push(MockEvent::Pin(*value));
    }

    fn unpin(&mut self, value: &usize) {
        self.slots[*value].pins -= 1;
        self.events.push(MockEvent::Unpin(*value));
    }

    fn persist(&mut self, value: &usize) -> usize {
        self.slots[*value].pins += 1;
        self.events.push(MockEvent::Persist(*value));
        *value
    }

    fn attach(&mut self, handle: &usize) -> usize {
        *handle
    }

    fn release(&mut self, handle: usize) {
        self.slots[handle].pins -= 1;
        self.events.push(MockEvent::Release(handle));
    }

    fn call(&mut self, function: &usize, args: [&usize; 3]) -> Result<usize, HostError> {
        self.events.push(MockEvent::Call(*function));
        let inputs = [
            self.data(*args[0])?.to_vec(),
            self.data(*args[1])?.to_vec(),
            self.data(*args[2])?.to_vec(),
        ];
        let out = match &self.slots[*function].obj {
            Obj::Function(body) => body(&inputs).map_err(HostError::UserFailure)?,
            _ => {
                return Err(HostError::NotCallable {
                    found: self.type_name(function),
                })
            }
        };
        Ok(self.alloc(out))
    }

    fn with_f64_slice<T>(&self, value: &usize, f: impl FnOnce(&[f64]) -> T) -> Result<T, HostError> {
        self.data(*value).map(f)
    }
}
