//! Rig definitions: skeleton + channel layout + default pose.
//!
//! A rig is built once (from authoring data or a blob) and then shared
//! read-only, typically behind an `Arc`. Its binding set defines the channel
//! index space every stream and clip instance is expressed in.
//!
//! Every skeleton node contributes one translation, one rotation and one
//! scale channel keyed by the node's hash. Because binding sequences are
//! sorted by hash, a node's channel index is generally not its node index;
//! use [`RigDefinition::node_channels`] to go from one to the other.

use glam::{Quat, Vec3};
use hashbrown::{HashMap, HashSet};

use crate::binding::{BindingSet, BindingSetBuilder, ChannelKind};
use crate::error::{Result, RigError};
use crate::hash::{ContentHasher, StringHash};

/// Parent index of a root node.
pub const ROOT_PARENT: i32 = -1;

/// One skeleton node with its default local transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkeletonNode {
    pub parent: i32,
    pub id: StringHash,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// Optional axis (joint limit frame) index, -1 when absent.
    pub axis: i32,
}

impl SkeletonNode {
    pub fn is_root(&self) -> bool {
        self.parent == ROOT_PARENT
    }
}

/// Channel indices of a skeleton node within the rig's binding set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NodeChannels {
    pub translation: usize,
    pub rotation: usize,
    pub scale: usize,
}

/// Immutable rig: skeleton, bindings and per-slot default values.
#[derive(Clone, Debug, PartialEq)]
pub struct RigDefinition {
    name: String,
    nodes: Vec<SkeletonNode>,
    bindings: BindingSet,
    defaults: Vec<f32>,
    node_channels: Vec<NodeChannels>,
    content_hash: u64,
}

impl RigDefinition {
    /// Assemble and validate a rig from already laid-out parts.
    ///
    /// Used by the blob decoder; authoring code goes through [`RigBuilder`].
    pub fn from_parts(
        name: impl Into<String>,
        nodes: Vec<SkeletonNode>,
        bindings: BindingSet,
        defaults: Vec<f32>,
    ) -> Result<Self> {
        let name = name.into();
        validate_skeleton(&name, &nodes, |i| format!("node {i}"))?;

        let expected = bindings.curve_count();
        if defaults.len() != expected {
            return Err(RigError::InvalidRig {
                rig: name,
                reason: format!(
                    "default buffer has {} values, bindings need {expected}",
                    defaults.len()
                ),
            });
        }
        if let Some(pos) = defaults.iter().position(|v| !v.is_finite()) {
            return Err(RigError::InvalidRig {
                rig: name,
                reason: format!("default value at slot {pos} is not finite"),
            });
        }

        let mut node_channels = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let lookup = |kind: ChannelKind| {
                bindings
                    .find(kind, node.id)
                    .ok_or_else(|| RigError::InvalidRig {
                        rig: name.clone(),
                        reason: format!("node {} has no {kind} channel", node.id),
                    })
            };
            node_channels.push(NodeChannels {
                translation: lookup(ChannelKind::Translation)?,
                rotation: lookup(ChannelKind::Rotation)?,
                scale: lookup(ChannelKind::Scale)?,
            });
        }

        let content_hash = rig_content_hash(&nodes, &bindings, &defaults);
        log::debug!(
            "rig '{}' ready: {} nodes, {} channels, {} curves, hash {:#018x}",
            name,
            nodes.len(),
            bindings.channel_count(),
            expected,
            content_hash
        );
        Ok(Self {
            name,
            nodes,
            bindings,
            defaults,
            node_channels,
            content_hash,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[SkeletonNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, index: usize) -> Result<&SkeletonNode> {
        self.nodes.get(index).ok_or(RigError::NodeOutOfRange {
            index,
            count: self.nodes.len(),
        })
    }

    /// Parent of `index`, `None` for a root.
    pub fn parent(&self, index: usize) -> Result<Option<usize>> {
        let node = self.node(index)?;
        Ok((!node.is_root()).then_some(node.parent as usize))
    }

    pub fn node_index(&self, id: StringHash) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn node_channels(&self, index: usize) -> Result<NodeChannels> {
        self.node_channels
            .get(index)
            .copied()
            .ok_or(RigError::NodeOutOfRange {
                index,
                count: self.nodes.len(),
            })
    }

    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    pub fn default_values(&self) -> &[f32] {
        &self.defaults
    }

    pub fn curve_count(&self) -> usize {
        self.defaults.len()
    }

    pub fn channel_count(&self) -> usize {
        self.bindings.channel_count()
    }

    /// Stable identity of layout + data (name excluded).
    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }
}

fn rig_content_hash(nodes: &[SkeletonNode], bindings: &BindingSet, defaults: &[f32]) -> u64 {
    let mut h = ContentHasher::new(b"RIGD");
    h.u32(nodes.len() as u32);
    for n in nodes {
        h.i32(n.parent).u32(n.id.0);
        for v in n.translation.to_array() {
            h.f32(v);
        }
        for v in n.rotation.to_array() {
            h.f32(v);
        }
        for v in n.scale.to_array() {
            h.f32(v);
        }
        h.i32(n.axis);
    }
    bindings.hash_into(&mut h);
    h.floats(defaults);
    h.finish()
}

/// Parents must precede children and node ids are unique; `label` names a
/// node in errors.
pub(crate) fn validate_skeleton(
    rig: &str,
    nodes: &[SkeletonNode],
    label: impl Fn(usize) -> String,
) -> Result<()> {
    let mut seen = HashSet::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        if !seen.insert(node.id) {
            return Err(RigError::DuplicateBinding {
                owner: rig.to_string(),
                kind: ChannelKind::Translation,
                hash: node.id,
            });
        }
        let ok = node.parent == ROOT_PARENT || (node.parent >= 0 && (node.parent as usize) < i);
        if !ok {
            return Err(RigError::InvalidSkeleton {
                node: i,
                name: label(i),
                parent: node.parent,
            });
        }
        let finite = node.translation.is_finite()
            && node.rotation.is_finite()
            && node.scale.is_finite();
        if !finite {
            return Err(RigError::InvalidRig {
                rig: rig.to_string(),
                reason: format!("node {} ('{}') has a non-finite default", i, label(i)),
            });
        }
    }
    Ok(())
}

#[derive(Clone, Debug)]
struct NodeDecl {
    name: String,
    node: SkeletonNode,
}

#[derive(Clone, Debug)]
struct ChannelDecl {
    kind: ChannelKind,
    name: String,
    value: [f32; 4],
}

/// Collects skeleton nodes and custom channels, then freezes a [`RigDefinition`].
#[derive(Clone, Debug, Default)]
pub struct RigBuilder {
    name: String,
    nodes: Vec<NodeDecl>,
    channels: Vec<ChannelDecl>,
}

impl RigBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Declare a node with an identity default transform.
    pub fn add_node(&mut self, name: &str, parent: i32) -> &mut Self {
        self.add_node_trs(name, parent, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE)
    }

    pub fn add_node_trs(
        &mut self,
        name: &str,
        parent: i32,
        translation: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) -> &mut Self {
        self.nodes.push(NodeDecl {
            name: name.to_string(),
            node: SkeletonNode {
                parent,
                id: StringHash::new(name),
                translation,
                rotation,
                scale,
                axis: -1,
            },
        });
        self
    }

    /// Set the axis index of the most recently declared node.
    pub fn with_axis(&mut self, axis: i32) -> &mut Self {
        if let Some(last) = self.nodes.last_mut() {
            last.node.axis = axis;
        }
        self
    }

    pub fn add_translation(&mut self, name: &str, default: Vec3) -> &mut Self {
        self.push_channel(ChannelKind::Translation, name, default.extend(0.0).to_array())
    }

    pub fn add_rotation(&mut self, name: &str, default: Quat) -> &mut Self {
        self.push_channel(ChannelKind::Rotation, name, default.to_array())
    }

    pub fn add_scale(&mut self, name: &str, default: Vec3) -> &mut Self {
        self.push_channel(ChannelKind::Scale, name, default.extend(0.0).to_array())
    }

    pub fn add_float(&mut self, name: &str, default: f32) -> &mut Self {
        self.push_channel(ChannelKind::Float, name, [default, 0.0, 0.0, 0.0])
    }

    pub fn add_int(&mut self, name: &str, default: i32) -> &mut Self {
        self.push_channel(ChannelKind::Int, name, [default as f32, 0.0, 0.0, 0.0])
    }

    fn push_channel(&mut self, kind: ChannelKind, name: &str, value: [f32; 4]) -> &mut Self {
        self.channels.push(ChannelDecl {
            kind,
            name: name.to_string(),
            value,
        });
        self
    }

    pub fn build(&self) -> Result<RigDefinition> {
        let nodes: Vec<SkeletonNode> = self.nodes.iter().map(|d| d.node).collect();
        validate_skeleton(&self.name, &nodes, |i| self.nodes[i].name.clone())?;

        let mut builder = BindingSetBuilder::new();
        let mut values: HashMap<(ChannelKind, StringHash), [f32; 4]> = HashMap::new();
        for d in &self.nodes {
            let n = &d.node;
            builder
                .push(ChannelKind::Translation, n.id)
                .push(ChannelKind::Rotation, n.id)
                .push(ChannelKind::Scale, n.id);
            values.insert(
                (ChannelKind::Translation, n.id),
                n.translation.extend(0.0).to_array(),
            );
            values.insert((ChannelKind::Rotation, n.id), n.rotation.to_array());
            values.insert((ChannelKind::Scale, n.id), n.scale.extend(0.0).to_array());
        }
        for c in &self.channels {
            if c.value.iter().any(|v| !v.is_finite()) {
                return Err(RigError::InvalidRig {
                    rig: self.name.clone(),
                    reason: format!("{} channel '{}' has a non-finite default", c.kind, c.name),
                });
            }
            let hash = StringHash::new(&c.name);
            builder.push(c.kind, hash);
            values.insert((c.kind, hash), c.value);
        }
        let bindings = builder.build(&self.name)?;

        let mut defaults = Vec::with_capacity(bindings.curve_count());
        for kind in ChannelKind::ALL {
            for hash in bindings.get(kind) {
                let v = values.get(&(kind, *hash)).copied().unwrap_or_default();
                defaults.extend_from_slice(&v[..kind.curves()]);
            }
        }

        RigDefinition::from_parts(self.name.clone(), nodes, bindings, defaults)
    }
}
