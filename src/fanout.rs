//! Broadcasting one event stream to several sinks.
//!
//! Every call on a [`FanOutSink`] is made on each delegate in list order, and
//! each call completes, nested values included, before the next delegate is
//! called. Starting a structure starts it on every delegate and gathers the
//! children into another fan-out view, so the broadcast holds at every
//! nesting level.

use crate::{Descriptor, Encode, Primitive, Result, StructureSink, ValueSink};

/// Fan-out over value sinks.
#[derive(Debug, Default)]
pub struct FanOutSink<'a> {
    delegates: Vec<Box<dyn ValueSink + 'a>>,
}

impl<'a> FanOutSink<'a> {
    #[must_use]
    pub fn new(delegates: Vec<Box<dyn ValueSink + 'a>>) -> Self {
        FanOutSink { delegates }
    }

    /// Returns a fan-out with `delegate` appended.
    #[must_use]
    pub fn plus<S: ValueSink + 'a>(mut self, delegate: S) -> Self {
        self.delegates.push(Box::new(delegate));
        self
    }

    /// Returns a fan-out whose delegates are `f` applied to each delegate.
    #[must_use]
    pub fn map<F>(self, f: F) -> Self
    where
        F: FnMut(Box<dyn ValueSink + 'a>) -> Box<dyn ValueSink + 'a>,
    {
        FanOutSink {
            delegates: self.delegates.into_iter().map(f).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.delegates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delegates.is_empty()
    }

    pub fn into_delegates(self) -> Vec<Box<dyn ValueSink + 'a>> {
        self.delegates
    }
}

impl ValueSink for FanOutSink<'_> {
    fn encode_primitive(&mut self, value: Primitive) -> Result<()> {
        for delegate in &mut self.delegates {
            delegate.encode_primitive(value.clone())?;
        }
        Ok(())
    }

    fn encode_null(&mut self) -> Result<()> {
        for delegate in &mut self.delegates {
            delegate.encode_null()?;
        }
        Ok(())
    }

    fn encode_enum(&mut self, descriptor: &'static Descriptor, variant: usize) -> Result<()> {
        for delegate in &mut self.delegates {
            delegate.encode_enum(descriptor, variant)?;
        }
        Ok(())
    }

    fn encode_inline(&mut self, descriptor: &'static Descriptor) -> Result<Box<dyn ValueSink + '_>> {
        let mut children = Vec::with_capacity(self.delegates.len());
        for delegate in &mut self.delegates {
            children.push(delegate.encode_inline(descriptor)?);
        }
        Ok(Box::new(FanOutSink::new(children)))
    }

    fn begin_structure(
        &mut self,
        descriptor: &'static Descriptor,
    ) -> Result<Box<dyn StructureSink + '_>> {
        let mut children = Vec::with_capacity(self.delegates.len());
        for delegate in &mut self.delegates {
            children.push(delegate.begin_structure(descriptor)?);
        }
        Ok(Box::new(FanOutStructure::new(children)))
    }

    fn begin_collection(
        &mut self,
        descriptor: &'static Descriptor,
        size: usize,
    ) -> Result<Box<dyn StructureSink + '_>> {
        let mut children = Vec::with_capacity(self.delegates.len());
        for delegate in &mut self.delegates {
            children.push(delegate.begin_collection(descriptor, size)?);
        }
        Ok(Box::new(FanOutStructure::new(children)))
    }

    fn encode_value(&mut self, value: &dyn Encode) -> Result<()> {
        for delegate in &mut self.delegates {
            delegate.encode_value(value)?;
        }
        Ok(())
    }
}

/// Fan-out over structure sinks.
#[derive(Debug, Default)]
pub struct FanOutStructure<'a> {
    delegates: Vec<Box<dyn StructureSink + 'a>>,
}

impl<'a> FanOutStructure<'a> {
    #[must_use]
    pub fn new(delegates: Vec<Box<dyn StructureSink + 'a>>) -> Self {
        FanOutStructure { delegates }
    }

    #[must_use]
    pub fn plus<S: StructureSink + 'a>(mut self, delegate: S) -> Self {
        self.delegates.push(Box::new(delegate));
        self
    }

    #[must_use]
    pub fn map<F>(self, f: F) -> Self
    where
        F: FnMut(Box<dyn StructureSink + 'a>) -> Box<dyn StructureSink + 'a>,
    {
        FanOutStructure {
            delegates: self.delegates.into_iter().map(f).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.delegates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delegates.is_empty()
    }
}

impl StructureSink for FanOutStructure<'_> {
    fn write_primitive_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: Primitive,
    ) -> Result<()> {
        for delegate in &mut self.delegates {
            delegate.write_primitive_field(descriptor, index, value.clone())?;
        }
        Ok(())
    }

    fn write_inline_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
    ) -> Result<Box<dyn ValueSink + '_>> {
        let mut children = Vec::with_capacity(self.delegates.len());
        for delegate in &mut self.delegates {
            children.push(delegate.write_inline_field(descriptor, index)?);
        }
        Ok(Box::new(FanOutSink::new(children)))
    }

    fn write_value_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: &dyn Encode,
    ) -> Result<()> {
        for delegate in &mut self.delegates {
            delegate.write_value_field(descriptor, index, value)?;
        }
        Ok(())
    }

    fn end_structure(&mut self, descriptor: &'static Descriptor) -> Result<()> {
        for delegate in &mut self.delegates {
            delegate.end_structure(descriptor)?;
        }
        Ok(())
    }

    fn should_encode_default(&self, descriptor: &'static Descriptor, index: usize) -> bool {
        self.delegates
            .iter()
            .any(|delegate| delegate.should_encode_default(descriptor, index))
    }
}
