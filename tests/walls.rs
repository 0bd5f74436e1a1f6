use reactsim::core::geometry::{Pos2, Vec2};
use reactsim::core::{Body, Container, Removal, Simulation, Species};
use reactsim::error::Result;

fn sim_in(max_x: f64, max_y: f64) -> Result<Simulation> {
    Ok(Simulation::new(Container::new(
        Pos2::new(0.0, 0.0),
        Pos2::new(max_x, max_y),
    )?))
}

/// A fixed wall flips the normal velocity component.
#[test]
fn static_wall_reverses_normal_velocity() -> Result<()> {
    let mut sim = sim_in(200.0, 100.0)?;
    // Light has radius 3; after 0.1 its center is 2.5 from the left wall
    let id = sim.add_atom(Species::Light, Pos2::new(3.0, 50.0), Vec2::new(-5.0, 1.0))?;
    sim.tick(0.1)?;
    let m = sim.body(id)?;
    assert!((m.velocity() - Vec2::new(5.0, 1.0)).norm() < 1e-12);
    // Pushed back to touching
    assert!(m.position().x >= 3.0 - 1e-9);
    Ok(())
}

/// A moving left wall reflects in its own frame and the gained energy is kept.
#[test]
fn moving_wall_does_work_that_survives_correction() -> Result<()> {
    let mut sim = sim_in(200.0, 100.0)?;
    assert!(sim.set_left_wall_velocity(2.0));
    let id = sim.add_atom(Species::Light, Pos2::new(3.5, 50.0), Vec2::new(-5.0, 0.0))?;

    sim.tick(0.1)?;
    assert!((sim.container().min_x() - 0.2).abs() < 1e-12);
    // v' = 2 * 2 - (-5)
    let v = sim.body(id)?.velocity();
    assert!((v.x - 9.0).abs() < 1e-9, "got {v:?}");
    Ok(())
}

/// Bodies beyond the escape offset are removed once and vanish from later reports.
#[test]
fn bodies_past_the_escape_offset_are_removed() -> Result<()> {
    let mut sim = sim_in(100.0, 100.0)?;
    assert_eq!(sim.escape_offset(), 30.0);
    let gone = sim.add_atom(Species::Light, Pos2::new(150.0, 50.0), Vec2::zeros())?;
    let kept = sim.add_atom(Species::Light, Pos2::new(50.0, 50.0), Vec2::zeros())?;

    let report = sim.tick(0.1)?.expect("running");
    assert!(report.removed.contains(&(gone, Removal::Escaped)));
    assert!(report.snapshot(gone).is_none());
    assert!(report.snapshot(kept).is_some());
    assert_eq!(sim.num_bodies(), 1);
    assert!(sim.body(gone).is_err());

    let rx = sim.subscribe();
    sim.tick(0.1)?;
    let next = rx.try_recv().expect("one report per tick");
    assert!(next.snapshot(gone).is_none());
    assert!(!next.was_removed(gone));
    Ok(())
}

/// A body past a wall but within the escape bounds is pushed back by that wall.
#[test]
fn body_outside_the_box_is_caught_by_the_nearest_wall() -> Result<()> {
    let mut sim = sim_in(100.0, 100.0)?;
    // Inside the escape bounds but past the right wall, still heading out
    let id = sim.add_atom(Species::Light, Pos2::new(110.0, 50.0), Vec2::new(4.0, 0.0))?;
    sim.tick(0.1)?;
    let m = sim.body(id)?;
    assert!(m.velocity().x < 0.0);
    assert!(m.position().x <= 97.0 + 1e-9);
    Ok(())
}

/// A body moving up through the opening is not reflected and is removed past the offset.
#[test]
fn opening_lets_bodies_escape_through_the_top() -> Result<()> {
    let mut sim = sim_in(200.0, 200.0)?;
    assert!(sim.set_opening(Some((50.0, 150.0))));
    let id = sim.add_atom(Species::Light, Pos2::new(100.0, 5.0), Vec2::new(0.0, -100.0))?;

    // Not reflected while passing through the opening
    sim.tick(0.1)?;
    assert!(sim.body(id)?.velocity().y < 0.0);
    assert!(sim.registry().is_escaping(id));

    let mut escaped_at = None;
    for _ in 0..10 {
        let report = sim.tick(0.1)?.expect("running");
        if report.was_removed(id) {
            escaped_at = Some(report.tick);
            break;
        }
    }
    // y = -35 after the fourth tick, beyond min_y - 30
    assert_eq!(escaped_at, Some(4));
    assert_eq!(sim.num_bodies(), 0);
    Ok(())
}

/// The same body bounces off a closed top wall.
#[test]
fn closed_top_wall_reflects_the_same_body() -> Result<()> {
    let mut sim = sim_in(200.0, 200.0)?;
    let id = sim.add_atom(Species::Light, Pos2::new(100.0, 5.0), Vec2::new(0.0, -100.0))?;
    sim.tick(0.1)?;
    let m = sim.body(id)?;
    assert!(m.velocity().y > 0.0);
    assert!(m.position().y >= 3.0 - 1e-9);
    assert!(!sim.registry().is_escaping(id));
    Ok(())
}

/// A body that enters the opening and then drifts sideways under the solid part of the top
/// wall bounces off it and off the side wall instead of leaving the box.
#[test]
fn escaping_body_sliding_under_the_top_wall_stays_inside() -> Result<()> {
    let mut sim = sim_in(200.0, 100.0)?;
    assert!(sim.set_opening(Some((40.0, 60.0))));
    // Light (r = 3) with its top edge already past the wall line, inside the opening
    let id = sim.add_atom(Species::Light, Pos2::new(42.0, 2.5), Vec2::new(-40.0, -0.01))?;

    sim.tick(0.01)?;
    assert!(sim.registry().is_escaping(id));

    for _ in 0..200 {
        let report = sim.tick(0.01)?.expect("running");
        assert!(!report.was_removed(id), "left the box at tick {}", report.tick);
        let m = sim.body(id)?;
        let p = m.position();
        assert!(p.x >= 3.0 - 1e-9 && p.y > 0.0, "tick {}: at {p:?}", report.tick);
    }
    let m = sim.body(id)?;
    // Turned around by the left wall and pushed down by the top wall
    assert!(m.velocity().x > 0.0);
    assert!(m.velocity().y > 0.0);
    assert!(!sim.registry().is_escaping(id));
    Ok(())
}
