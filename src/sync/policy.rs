//! Per-kind visual policy: what an anchor looks like when it is added, and
//! how its representation changes when the anchor is updated.
//!
//! | Kind | On add | On update |
//! |------|--------|-----------|
//! | Plane | plane sized extent.x × extent.z, colored by alignment | resize only if the extent changed |
//! | Image | plane sized to the physical size | resize if the physical size changed |
//! | Object | box sized to the extent, offset to the center | re-center and re-size |
//! | Face | shared deformable face mesh | regenerate from the latest mesh |

use std::f32::consts::FRAC_PI_2;

use crate::config::SyncConfig;
use crate::model::*;
use crate::scene::SceneGraph;
use crate::Result;

/// Planes are modeled upright; lay them flat in the anchor's frame.
fn lay_flat(position: Vec3) -> Transform {
    Transform::from_position(position)
        .with_orientation(Quat::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), -FRAC_PI_2))
}

const BOX_CHAMFER_RADIUS: f32 = 0.01;

/// Colors and options applied to representation nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualPolicy {
    pub horizontal_plane_color: Color,
    pub vertical_plane_color: Color,
    pub image_color: Color,
    pub object_color: Color,
    pub face_color: Color,
    pub face_fill_mesh: bool,
}

impl Default for VisualPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl VisualPolicy {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            horizontal_plane_color: Color::YELLOW.with_alpha(config.plane_alpha),
            vertical_plane_color: Color::BLUE.with_alpha(config.plane_alpha),
            image_color: config.image_color,
            object_color: config.object_color,
            face_color: config.face_color,
            face_fill_mesh: config.face_fill_mesh,
        }
    }

    fn plane_color(&self, alignment: PlaneAlignment) -> Color {
        match alignment {
            PlaneAlignment::Horizontal => self.horizontal_plane_color,
            PlaneAlignment::Vertical => self.vertical_plane_color,
        }
    }

    /// Geometry for a kind, as it should look right now.
    fn geometry(&self, kind: &AnchorKind) -> Geometry {
        match kind {
            AnchorKind::Plane { extent, .. } => Geometry::Plane { width: extent.x, height: extent.z },
            AnchorKind::Image { physical_size } => Geometry::Plane {
                width: physical_size.width,
                height: physical_size.height,
            },
            AnchorKind::Object { extent, .. } => Geometry::Box {
                width: extent.x,
                height: extent.y,
                length: extent.z,
                chamfer_radius: BOX_CHAMFER_RADIUS,
            },
            AnchorKind::Face { mesh_version } => Geometry::FaceMesh {
                mesh_version: *mesh_version,
                fill_mesh: self.face_fill_mesh,
            },
        }
    }

    fn material(&self, kind: &AnchorKind) -> Material {
        match kind {
            AnchorKind::Plane { alignment, .. } => Material::diffuse(self.plane_color(*alignment)),
            AnchorKind::Image { .. } => Material::diffuse(self.image_color),
            AnchorKind::Object { .. } => Material::diffuse(self.object_color),
            AnchorKind::Face { .. } => Material::diffuse(self.face_color),
        }
    }

    /// Local pose of the representation inside its anchor container.
    fn local_transform(&self, kind: &AnchorKind) -> Transform {
        match kind {
            AnchorKind::Plane { center, .. } => lay_flat(*center),
            AnchorKind::Image { .. } => lay_flat(Vec3::ZERO),
            AnchorKind::Object { center, .. } => Transform::from_position(*center),
            AnchorKind::Face { .. } => Transform::IDENTITY,
        }
    }

    /// The node to create when an anchor of this kind is added.
    pub fn representation(&self, kind: &AnchorKind) -> NodeSpec {
        NodeSpec::with_geometry(self.geometry(kind), self.material(kind), self.local_transform(kind))
            .named(format!("{}-representation", kind.tag()))
    }

    /// Bring an existing representation in line with `current`.
    ///
    /// Returns true if the geometry was mutated. Planes and images compare
    /// their size against the live geometry first and skip the mutation
    /// when nothing changed; objects and faces always regenerate.
    pub fn refresh<S: SceneGraph>(
        &self,
        scene: &S,
        representation: NodeId,
        previous: &AnchorKind,
        current: &AnchorKind,
    ) -> Result<bool> {
        let wanted = self.geometry(current);

        if previous.tag() != current.tag() {
            let mut replacement = Some(wanted);
            scene.mutate_geometry(representation, &mut |g| {
                if let Some(next) = replacement.take() {
                    *g = next;
                }
            })?;
            scene.set_material(representation, self.material(current))?;
            scene.set_transform(representation, self.local_transform(current))?;
            return Ok(true);
        }

        match current {
            AnchorKind::Plane { alignment, center, .. } => {
                if let AnchorKind::Plane { alignment: was, center: was_center, .. } = previous {
                    if was != alignment {
                        scene.set_material(representation, self.material(current))?;
                    }
                    if was_center != center {
                        scene.set_transform(representation, self.local_transform(current))?;
                    }
                }
                self.resize_if_changed(scene, representation, wanted)
            }
            AnchorKind::Image { .. } => self.resize_if_changed(scene, representation, wanted),
            AnchorKind::Object { .. } => {
                scene.set_transform(representation, self.local_transform(current))?;
                self.overwrite(scene, representation, wanted)?;
                Ok(true)
            }
            AnchorKind::Face { .. } => {
                self.overwrite(scene, representation, wanted)?;
                Ok(true)
            }
        }
    }

    fn resize_if_changed<S: SceneGraph>(&self, scene: &S, node: NodeId, wanted: Geometry) -> Result<bool> {
        if scene.geometry(node)?.as_ref() == Some(&wanted) {
            return Ok(false);
        }
        self.overwrite(scene, node, wanted)?;
        Ok(true)
    }

    fn overwrite<S: SceneGraph>(&self, scene: &S, node: NodeId, wanted: Geometry) -> Result<()> {
        scene.mutate_geometry(node, &mut |g| match (&mut *g, &wanted) {
            (Geometry::Plane { width, height }, Geometry::Plane { width: w, height: h }) => {
                *width = *w;
                *height = *h;
            }
            (
                Geometry::Box { width, height, length, .. },
                Geometry::Box { width: w, height: h, length: l, .. },
            ) => {
                *width = *w;
                *height = *h;
                *length = *l;
            }
            (Geometry::FaceMesh { mesh_version, .. }, Geometry::FaceMesh { mesh_version: v, .. }) => {
                *mesh_version = *v;
            }
            (g, w) => *g = w.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;

    fn plane(alignment: PlaneAlignment, x: f32, z: f32) -> AnchorKind {
        AnchorKind::Plane { alignment, extent: Vec3::new(x, 0.0, z), center: Vec3::ZERO }
    }

    #[test]
    fn test_plane_color_by_alignment() {
        let policy = VisualPolicy::default();
        let h = policy.representation(&plane(PlaneAlignment::Horizontal, 1.0, 1.0));
        let v = policy.representation(&plane(PlaneAlignment::Vertical, 1.0, 1.0));
        assert_eq!(h.material.unwrap().diffuse, Color::YELLOW.with_alpha(0.5));
        assert_eq!(v.material.unwrap().diffuse, Color::BLUE.with_alpha(0.5));
    }

    #[test]
    fn test_object_box_is_offset_to_center() {
        let policy = VisualPolicy::default();
        let kind = AnchorKind::Object { extent: Vec3::new(0.2, 0.3, 0.4), center: Vec3::new(0.0, 0.15, 0.0) };
        let spec = policy.representation(&kind);
        assert_eq!(spec.transform.position, Vec3::new(0.0, 0.15, 0.0));
        assert_eq!(spec.geometry, Some(Geometry::Box {
            width: 0.2, height: 0.3, length: 0.4, chamfer_radius: BOX_CHAMFER_RADIUS,
        }));
    }

    #[test]
    fn test_plane_refresh_skips_unchanged_extent() {
        let scene = MemoryScene::new();
        let policy = VisualPolicy::default();
        let kind = plane(PlaneAlignment::Horizontal, 1.0, 1.0);
        let node = scene.add_node(scene.root(), policy.representation(&kind)).unwrap();

        assert!(!policy.refresh(&scene, node, &kind, &kind).unwrap());
        assert_eq!(scene.geometry_mutations(), 0);

        let wider = plane(PlaneAlignment::Horizontal, 2.0, 1.0);
        assert!(policy.refresh(&scene, node, &kind, &wider).unwrap());
        assert_eq!(scene.geometry(node).unwrap(), Some(Geometry::Plane { width: 2.0, height: 1.0 }));
    }

    #[test]
    fn test_face_always_regenerates() {
        let scene = MemoryScene::new();
        let policy = VisualPolicy::default();
        let kind = AnchorKind::Face { mesh_version: 1 };
        let node = scene.add_node(scene.root(), policy.representation(&kind)).unwrap();

        assert!(policy.refresh(&scene, node, &kind, &AnchorKind::Face { mesh_version: 2 }).unwrap());
        assert_eq!(scene.node(node).unwrap().geometry_revision, 1);
        assert!(matches!(scene.geometry(node).unwrap(), Some(Geometry::FaceMesh { mesh_version: 2, .. })));
    }

    #[test]
    fn test_kind_change_replaces_geometry_in_place() {
        let scene = MemoryScene::new();
        let policy = VisualPolicy::default();
        let before = plane(PlaneAlignment::Horizontal, 1.0, 1.0);
        let node = scene.add_node(scene.root(), policy.representation(&before)).unwrap();

        let after = AnchorKind::Object { extent: Vec3::new(1.0, 1.0, 1.0), center: Vec3::ZERO };
        assert!(policy.refresh(&scene, node, &before, &after).unwrap());
        assert!(matches!(scene.geometry(node).unwrap(), Some(Geometry::Box { .. })));
        assert_eq!(scene.node(node).unwrap().material.unwrap().diffuse, policy.object_color);
    }
}
