//! Mesh storage and the per-frame draw queue.

use crate::backend::Backend;
use crate::material::MaterialId;
use crate::mesh::Transform;

/// Type-safe handle to a mesh in a [`MeshStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub(crate) usize);

/// A single mesh instance to draw this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCall {
    pub mesh: MeshId,
    pub transform: Transform,
    pub material: MaterialId,
}

/// Draw calls queued by the application for the next recorded frame.
///
/// The render graph hands the queued calls to every pass it records and
/// clears the queue afterwards, so each call is drawn exactly once.
#[derive(Clone, Debug, Default)]
pub struct DrawQueue {
    calls: Vec<DrawCall>,
}

impl DrawQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mesh: MeshId, transform: Transform, material: MaterialId) {
        self.calls.push(DrawCall {
            mesh,
            transform,
            material,
        });
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

/// Uploaded meshes, addressed by [`MeshId`]. Meshes live until the store is dropped.
pub struct MeshStore<B: Backend> {
    meshes: Vec<B::Mesh>,
}

impl<B: Backend> Default for MeshStore<B> {
    fn default() -> Self {
        Self { meshes: Vec::new() }
    }
}

impl<B: Backend> MeshStore<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mesh: B::Mesh) -> MeshId {
        let idx = self.meshes.len();
        self.meshes.push(mesh);
        MeshId(idx)
    }

    pub fn get(&self, id: MeshId) -> Option<&B::Mesh> {
        self.meshes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}
