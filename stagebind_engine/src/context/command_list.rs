/// Command list - finished work of a deferred context, executed on the
/// immediate context
///
/// Recorded native calls refer to objects by handle only, so the list holds
/// every object and pipeline those calls reference until it is dropped.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::binding::pipeline::Pipeline;
use crate::context::native_context::NativeCommandList;
use crate::device::{DeviceObject, NativeHandle};

/// Objects referenced by the native calls of one recording
#[derive(Debug, Default)]
pub(crate) struct RetainedObjects {
    objects: FxHashMap<NativeHandle, DeviceObject>,
    pipelines: Vec<Arc<Pipeline>>,
}

impl RetainedObjects {
    pub(crate) fn retain(&mut self, object: DeviceObject) {
        self.objects.entry(object.native_handle()).or_insert(object);
    }

    pub(crate) fn retain_pipeline(&mut self, pipeline: &Arc<Pipeline>) {
        if !self.pipelines.iter().any(|p| Arc::ptr_eq(p, pipeline)) {
            self.pipelines.push(pipeline.clone());
        }
    }

    pub(crate) fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub(crate) fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }
}

#[derive(Debug)]
pub struct CommandList {
    native: Box<dyn NativeCommandList>,
    retained: RetainedObjects,
}

impl CommandList {
    pub(crate) fn new(native: Box<dyn NativeCommandList>, retained: RetainedObjects) -> Self {
        Self { native, retained }
    }

    /// Number of recorded native calls
    pub fn command_count(&self) -> usize {
        self.native.command_count()
    }

    /// Distinct device objects kept alive for replay
    pub fn retained_object_count(&self) -> usize {
        self.retained.object_count()
    }

    /// Distinct pipelines kept alive for replay
    pub fn retained_pipeline_count(&self) -> usize {
        self.retained.pipeline_count()
    }

    pub fn native(&self) -> &dyn NativeCommandList {
        self.native.as_ref()
    }
}
