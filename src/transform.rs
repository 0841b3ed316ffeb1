//! Hierarchical 2D transforms.
//!
//! Every body owns one [`Transform`] in a [`TransformTree`]. A transform may have
//! a parent, in which case its global matrix is the parent's global matrix
//! multiplied by its own local matrix.

use crate::math::{self as m, MathError};
use thunderdome as td;

/// Generational handle to a transform in a [`TransformTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransformKey(pub(crate) td::Index);

impl TransformKey {
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum TransformError {
    #[error("transform {0:?} no longer exists")]
    Gone(TransformKey),
    #[error("attaching {child:?} to {parent:?} would create a cycle")]
    Cycle {
        child: TransformKey,
        parent: TransformKey,
    },
    #[error(transparent)]
    Math(#[from] MathError),
}

/// Translation, rotation and scale of an object relative to its parent
/// (or the world if it has no parent), plus the matrices derived from them.
///
/// After changing the public fields, call [`TransformTree::refresh`]
/// to bring the cached matrices up to date.
#[derive(Clone, Debug)]
pub struct Transform {
    pub translation: m::Vec2,
    /// Rotation in radians.
    pub rotation: f64,
    pub scale: m::Vec2,
    local: m::Mat3,
    global: m::Mat3,
    parent: Option<TransformKey>,
    children: Vec<TransformKey>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(m::Vec2::zero(), 0.0, m::Vec2::one())
    }
}

impl Transform {
    pub fn new(translation: m::Vec2, rotation: f64, scale: m::Vec2) -> Self {
        let local = m::affine(translation, rotation, scale);
        Self {
            translation,
            rotation,
            scale,
            local,
            global: local,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Rebuild the local matrix from translation, rotation and scale.
    #[inline]
    pub fn update_local(&mut self) {
        self.local = m::affine(self.translation, self.rotation, self.scale);
    }

    #[inline]
    pub fn local(&self) -> &m::Mat3 {
        &self.local
    }

    /// The world matrix as of the last refresh.
    #[inline]
    pub fn global(&self) -> &m::Mat3 {
        &self.global
    }

    /// World position of the transform's origin.
    #[inline]
    pub fn position(&self) -> m::Vec2 {
        m::translation_of(&self.global)
    }

    #[inline]
    pub fn parent(&self) -> Option<TransformKey> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[TransformKey] {
        &self.children
    }

    /// Overwrite the local fields with the decomposition of `mat`.
    fn rebake(&mut self, mat: &m::Mat3) {
        let d = m::decompose(mat);
        if d.reflected {
            log::warn!(
                "Transform matrix contains a reflection, which was dropped when re-deriving local fields"
            );
        }
        self.translation = d.translation;
        self.rotation = d.rotation;
        self.scale = d.scale;
        self.update_local();
    }
}

/// Arena of transforms linked into a forest.
#[derive(Debug, Default)]
pub struct TransformTree {
    nodes: td::Arena<Transform>,
}

impl TransformTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: td::Arena::with_capacity(capacity),
        }
    }

    /// Insert a parentless transform. Any links the given value carries are discarded.
    pub fn insert(&mut self, mut transform: Transform) -> TransformKey {
        transform.parent = None;
        transform.children.clear();
        transform.update_local();
        transform.global = transform.local;
        TransformKey(self.nodes.insert(transform))
    }

    #[inline]
    pub fn contains(&self, key: TransformKey) -> bool {
        self.nodes.contains(key.0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, key: TransformKey) -> Result<&Transform, TransformError> {
        self.nodes.get(key.0).ok_or(TransformError::Gone(key))
    }

    pub fn get_mut(&mut self, key: TransformKey) -> Result<&mut Transform, TransformError> {
        self.nodes.get_mut(key.0).ok_or(TransformError::Gone(key))
    }

    /// Remove a transform from the tree.
    ///
    /// Its children become roots and keep their current world pose.
    pub fn remove(&mut self, key: TransformKey) -> Result<Transform, TransformError> {
        self.update_global(key)?;
        let mut removed = self.nodes.remove(key.0).ok_or(TransformError::Gone(key))?;

        if let Some(parent) = removed.parent.take() {
            if let Some(p) = self.nodes.get_mut(parent.0) {
                p.children.retain(|&c| c != key);
            }
        }
        for child_key in std::mem::take(&mut removed.children) {
            if let Some(child) = self.nodes.get_mut(child_key.0) {
                child.parent = None;
                let global = child.global;
                child.rebake(&global);
                child.global = child.local;
            }
        }
        removed.update_local();
        removed.global = removed.local;
        Ok(removed)
    }

    /// Recompute the global matrix of `key` by pulling the global matrices of its
    /// ancestors, rebuilding every local matrix on the way.
    pub fn update_global(&mut self, key: TransformKey) -> Result<m::Mat3, TransformError> {
        let mut chain = vec![key];
        let mut curr = self.get(key)?.parent;
        while let Some(ancestor) = curr {
            chain.push(ancestor);
            curr = self.get(ancestor)?.parent;
        }

        let mut parent_global: Option<m::Mat3> = None;
        for &link in chain.iter().rev() {
            let node = self.get_mut(link)?;
            node.update_local();
            node.global = match parent_global {
                Some(pg) => pg * node.local,
                None => node.local,
            };
            parent_global = Some(node.global);
        }
        // chain always contains at least `key`
        Ok(parent_global.unwrap_or_else(m::Mat3::identity))
    }

    /// Recompute the global matrix of every descendant of `key` from its local fields,
    /// assuming the global matrix of `key` itself is current.
    pub fn propagate(&mut self, key: TransformKey) -> Result<(), TransformError> {
        let root = self.get(key)?;
        let mut stack: Vec<(TransformKey, m::Mat3)> =
            root.children.iter().map(|&c| (c, root.global)).collect();

        while let Some((child_key, parent_global)) = stack.pop() {
            let child = self.get_mut(child_key)?;
            child.update_local();
            child.global = parent_global * child.local;
            let global = child.global;
            stack.extend(child.children.iter().map(|&c| (c, global)));
        }
        Ok(())
    }

    /// Bring `key` and all of its descendants up to date after its fields changed.
    pub fn refresh(&mut self, key: TransformKey) -> Result<(), TransformError> {
        self.update_global(key)?;
        self.propagate(key)
    }

    /// All transforms below `key` in the hierarchy, not including `key` itself.
    pub fn descendants(&self, key: TransformKey) -> Result<Vec<TransformKey>, TransformError> {
        let mut out = Vec::new();
        let mut stack: Vec<TransformKey> = self.get(key)?.children.clone();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend_from_slice(&self.get(next)?.children);
        }
        Ok(out)
    }

    fn is_ancestor_or_self(
        &self,
        candidate: TransformKey,
        of: TransformKey,
    ) -> Result<bool, TransformError> {
        let mut curr = Some(of);
        while let Some(k) = curr {
            if k == candidate {
                return Ok(true);
            }
            curr = self.get(k)?.parent;
        }
        Ok(false)
    }

    /// Make `parent` the parent of `child` without moving `child` in the world.
    ///
    /// The child's local fields are re-derived from `parent.global⁻¹ · child.global`.
    /// Nothing is changed if the parent's matrix can't be inverted.
    pub fn attach(&mut self, child: TransformKey, parent: TransformKey) -> Result<(), TransformError> {
        self.get(child)?;
        self.get(parent)?;
        if self.is_ancestor_or_self(child, parent)? {
            return Err(TransformError::Cycle { child, parent });
        }

        let parent_global = self.update_global(parent)?;
        let child_global = self.update_global(child)?;
        let new_local = m::try_inverse(&parent_global)? * child_global;

        if let Some(old_parent) = self.get(child)?.parent {
            self.get_mut(old_parent)?.children.retain(|&c| c != child);
        }
        self.get_mut(parent)?.children.push(child);

        let node = self.get_mut(child)?;
        node.parent = Some(parent);
        node.rebake(&new_local);
        node.global = parent_global * node.local;
        self.propagate(child)
    }

    /// Cut `child` loose from its parent, keeping its world pose.
    /// Does nothing if it has no parent.
    pub fn detach(&mut self, child: TransformKey) -> Result<(), TransformError> {
        let parent = match self.get(child)?.parent {
            Some(p) => p,
            None => return Ok(()),
        };
        let global = self.update_global(child)?;
        self.get_mut(parent)?.children.retain(|&c| c != child);

        let node = self.get_mut(child)?;
        node.parent = None;
        node.rebake(&global);
        node.global = node.local;
        self.propagate(child)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TransformKey, &Transform)> {
        self.nodes.iter().map(|(idx, t)| (TransformKey(idx), t))
    }
}
