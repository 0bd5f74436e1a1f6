//! Contact detection for one tick.
//!
//! A pure query over the registry and the container: every unordered pair of top-level bodies
//! is tested (bounding circles first, then atom against atom), followed by each body's wall
//! contacts. Contacts come out in body registration order.

use crate::core::contact::{CollisionSpec, ContactKind};
use crate::core::container::{Container, WallSide};
use crate::core::geometry::{closest_on_segment, distance_sq, unit_between, Pos2, CONTACT_SLOP};
use crate::core::molecule::{Body, BodyId, Molecule};
use crate::core::registry::Registry;
use crate::error::Result;

/// Everything the detector found.
///
/// - `contacts`: contacts to resolve this tick
/// - `entering_opening`: bodies that reached the top-wall opening and were let through
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub contacts: Vec<CollisionSpec>,
    pub entering_opening: Vec<BodyId>,
}

/// Find every contact among registered bodies and between bodies and walls.
pub fn detect_contacts(registry: &Registry, container: &Container) -> Result<Detection> {
    let bodies: Vec<&Molecule> = registry.iter().collect();
    let mut out = Detection::default();

    for (i, a) in bodies.iter().enumerate() {
        for b in &bodies[i + 1..] {
            molecule_contacts(a, b, &mut out.contacts)?;
        }
        wall_contacts(a, container, registry.is_escaping(a.id()), &mut out)?;
    }
    Ok(out)
}

fn molecule_contacts(a: &Molecule, b: &Molecule, out: &mut Vec<CollisionSpec>) -> Result<()> {
    let reach = a.extent() + b.extent() + CONTACT_SLOP;
    if distance_sq(&a.position(), &b.position()) > reach * reach {
        return Ok(());
    }
    let dv = b.velocity() - a.velocity();

    for atom_a in a.atoms() {
        for atom_b in b.atoms() {
            let r_sum = atom_a.radius + atom_b.radius;
            let delta = atom_b.position - atom_a.position;
            let dist = delta.norm();
            if dist > r_sum + CONTACT_SLOP {
                continue;
            }
            let Some(n) = unit_between(&atom_a.position, &atom_b.position) else {
                log::debug!(
                    "skipping contact {}-{}: coincident centers",
                    atom_a.id,
                    atom_b.id
                );
                continue;
            };
            // Only approaching pairs count
            if dv.dot(&n) >= 0.0 {
                continue;
            }
            let point = atom_a.position + delta * (atom_a.radius / r_sum);
            out.push(CollisionSpec::new(
                ContactKind::Molecules {
                    body_a: a.id(),
                    body_b: b.id(),
                    atom_a: atom_a.id,
                    atom_b: atom_b.id,
                    species_a: atom_a.species,
                    species_b: atom_b.species,
                },
                n,
                point,
                r_sum - dist,
            )?);
        }
    }
    Ok(())
}

/// Whether an escaping body is clear of the solid top wall: still over the opening, or already
/// above the box.
fn passing_through_top(container: &Container, p: &Pos2) -> bool {
    let over_opening = container
        .opening()
        .is_some_and(|(lo, hi)| p.x >= lo && p.x <= hi);
    over_opening || p.y < container.min_y()
}

fn wall_contacts(
    m: &Molecule,
    container: &Container,
    escaping: bool,
    out: &mut Detection,
) -> Result<()> {
    let mut touched = false;
    for atom in m.atoms() {
        for wall in container.walls() {
            if !wall.spans(&atom.position) {
                continue;
            }
            if escaping && wall.side == WallSide::Top && passing_through_top(container, &atom.position)
            {
                continue;
            }
            let d = wall.signed_distance(&atom.position);
            if d > atom.radius + CONTACT_SLOP {
                continue;
            }
            if wall.side == WallSide::Top && container.is_in_opening(&atom.position, atom.radius)
            {
                if !out.entering_opening.contains(&m.id()) {
                    out.entering_opening.push(m.id());
                }
                continue;
            }
            touched = true;
            out.contacts.push(CollisionSpec::new(
                ContactKind::Wall {
                    body: m.id(),
                    atom: atom.id,
                    side: wall.side,
                },
                wall.normal,
                closest_on_segment(&atom.position, &wall.start, &wall.end),
                atom.radius - d,
            )?);
        }
    }

    // Escaped particle catch: a body that slipped past every wall segment in one step
    let p = m.position();
    if !escaping && !touched && !container.contains(&p) && !out.entering_opening.contains(&m.id())
    {
        let wall = container.nearest_wall(&p);
        let d = wall.signed_distance(&p);
        out.contacts.push(CollisionSpec::new(
            ContactKind::Wall {
                body: m.id(),
                atom: m.atoms().first().map(|a| a.id).unwrap_or(m.id()),
                side: wall.side,
            },
            wall.normal,
            p - wall.normal * d,
            m.extent() - d,
        )?);
    }
    Ok(())
}
