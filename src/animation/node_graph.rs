//! Drifting node-graph background.
//!
//! [`NodeGraph`] is the pure simulation: particles bounce inside the canvas
//! and pairs closer than the link distance are joined by a line that fades
//! with distance. [`NodeGraphEffect`] owns the canvas and the frame loop
//! that steps and paints it.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use rand::Rng;

use crate::dom::frame::FrameLoop;
use crate::dom::{set_styles, Subscriptions};
use crate::host::{DrawOp, EventKind, EventTarget, Host, HostError, Rgb};
use crate::options::NodeGraphOptions;

/// Id of the injected canvas.
pub const CANVAS_ID: &str = "node-graph-canvas";
/// Class of the injected canvas.
pub const CANVAS_CLASS: &str = "node-graph-canvas";

const LINE_WIDTH: f32 = 0.5;
const LINE_MAX_ALPHA: f32 = 0.5;
const FALLBACK_COLOR: Rgb = Rgb(0xff, 0xf3, 0xa0);

/// One drifting node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// Position in canvas pixels.
    pub position: Vec2,
    /// Displacement per frame.
    pub velocity: Vec2,
    /// Drawn radius.
    pub radius: f32,
}

impl Particle {
    /// Random particle inside `bounds`: velocity components in
    /// `[-speed / 2, speed / 2)`, radius in `[1, 3)`.
    pub fn random(rng: &mut impl Rng, bounds: Vec2, speed: f32) -> Self {
        Self {
            position: Vec2::new(
                rng.random::<f32>() * bounds.x,
                rng.random::<f32>() * bounds.y,
            ),
            velocity: Vec2::new(
                (rng.random::<f32>() - 0.5) * speed,
                (rng.random::<f32>() - 0.5) * speed,
            ),
            radius: rng.random::<f32>() * 2.0 + 1.0,
        }
    }

    /// Integrate one frame, reflecting off the edges of `bounds` and
    /// clamping back inside.
    pub fn update(&mut self, bounds: Vec2) {
        self.position += self.velocity;
        if self.position.x < 0.0 || self.position.x > bounds.x {
            self.velocity.x = -self.velocity.x;
        }
        if self.position.y < 0.0 || self.position.y > bounds.y {
            self.velocity.y = -self.velocity.y;
        }
        self.position = self.position.clamp(Vec2::ZERO, bounds.max(Vec2::ZERO));
    }
}

/// Parse `#rrggbb`.
#[must_use]
pub fn parse_hex(color: &str) -> Option<Rgb> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgb(channel(0)?, channel(2)?, channel(4)?))
}

/// Particle simulation plus its drawing rules.
#[derive(Debug, Clone)]
pub struct NodeGraph {
    particles: Vec<Particle>,
    bounds: Vec2,
    max_distance: f32,
    color: Rgb,
}

impl NodeGraph {
    /// Graph of `count` random particles inside `bounds`.
    pub fn new(
        count: usize,
        bounds: Vec2,
        options: &NodeGraphOptions,
        rng: &mut impl Rng,
    ) -> Self {
        let particles = (0..count)
            .map(|_| Particle::random(rng, bounds, options.speed))
            .collect();
        Self::with_particles(particles, bounds, options)
    }

    /// Graph over an explicit particle set.
    #[must_use]
    pub fn with_particles(
        particles: Vec<Particle>,
        bounds: Vec2,
        options: &NodeGraphOptions,
    ) -> Self {
        let color = parse_hex(&options.color).unwrap_or_else(|| {
            log::warn!("Invalid node graph color '{}'", options.color);
            FALLBACK_COLOR
        });
        Self {
            particles,
            bounds,
            max_distance: options.max_distance,
            color,
        }
    }

    /// Current particles.
    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Canvas size.
    #[must_use]
    pub fn bounds(&self) -> Vec2 {
        self.bounds
    }

    /// Follow a canvas resize. Particles outside the new bounds are pulled
    /// back on their next update.
    pub fn resize(&mut self, bounds: Vec2) {
        self.bounds = bounds;
    }

    /// Advance every particle by one frame.
    pub fn update(&mut self) {
        let bounds = self.bounds;
        for particle in &mut self.particles {
            particle.update(bounds);
        }
    }

    /// Drawing commands for the current state: clear, nodes, then links.
    pub fn draw(&self, ops: &mut Vec<DrawOp>) {
        ops.push(DrawOp::Clear {
            width: self.bounds.x,
            height: self.bounds.y,
        });
        ops.extend(self.particles.iter().map(|p| DrawOp::Circle {
            center: p.position,
            radius: p.radius,
            color: self.color,
        }));
        for (i, a) in self.particles.iter().enumerate() {
            for b in &self.particles[i + 1..] {
                let distance = a.position.distance(b.position);
                if distance < self.max_distance {
                    ops.push(DrawOp::Line {
                        from: a.position,
                        to: b.position,
                        color: self.color,
                        alpha: (self.max_distance - distance) / self.max_distance
                            * LINE_MAX_ALPHA,
                        width: LINE_WIDTH,
                    });
                }
            }
        }
    }

    /// Update every particle, then draw.
    pub fn frame(&mut self) -> Vec<DrawOp> {
        self.update();
        let mut ops = Vec::with_capacity(1 + self.particles.len() * 2);
        self.draw(&mut ops);
        ops
    }
}

/// Canvas plus frame loop driving a [`NodeGraph`].
pub struct NodeGraphEffect<H: Host> {
    canvas: H::Node,
    graph: Rc<RefCell<NodeGraph>>,
    frames: Rc<FrameLoop<H>>,
}

impl<H: Host> NodeGraphEffect<H> {
    /// Inject the canvas, seed the particles and start animating.
    pub fn install(
        subs: &Rc<Subscriptions<H>>,
        options: &NodeGraphOptions,
        particle_count: usize,
        rng: &mut impl Rng,
    ) -> Result<Option<Self>, HostError> {
        let host = Rc::clone(subs.host());
        let Some(body) = host.body() else {
            return Ok(None);
        };
        let canvas = subs.inject(&body, "canvas", Some(CANVAS_CLASS))?;
        host.set_attribute(&canvas, "id", CANVAS_ID);
        set_styles(
            &*host,
            &canvas,
            &[
                ("position", "fixed"),
                ("top", "0"),
                ("left", "0"),
                ("width", "100vw"),
                ("height", "100vh"),
                ("pointer-events", "none"),
                ("z-index", "-1"),
                ("opacity", "0.3"),
            ],
        );

        let bounds = fit_canvas(&*host, &canvas);
        let graph = Rc::new(RefCell::new(NodeGraph::new(
            particle_count,
            bounds,
            options,
            rng,
        )));

        let weak_host = Rc::downgrade(&host);
        let resized = Rc::downgrade(&graph);
        let own = canvas.clone();
        let _ = subs.listen(
            &EventTarget::Window,
            EventKind::Resize,
            Rc::new(move |_| {
                let (Some(host), Some(graph)) = (weak_host.upgrade(), resized.upgrade())
                else {
                    return;
                };
                graph.borrow_mut().resize(fit_canvas(&*host, &own));
            }),
        );

        let frames = FrameLoop::new(Rc::clone(&host));
        let painter = Rc::downgrade(&host);
        let stepped = Rc::downgrade(&graph);
        let target = canvas.clone();
        frames.start(move |_| {
            let (Some(host), Some(graph)) = (painter.upgrade(), stepped.upgrade()) else {
                return;
            };
            let ops = graph.borrow_mut().frame();
            if let Err(e) = host.paint(&target, &ops) {
                log::warn!("Node graph paint failed: {e}");
            }
        });

        log::debug!("Node graph started with {particle_count} particles");
        Ok(Some(Self {
            canvas,
            graph,
            frames,
        }))
    }

    /// The injected canvas.
    pub fn canvas(&self) -> &H::Node {
        &self.canvas
    }

    /// Snapshot of the simulation.
    pub fn graph(&self) -> NodeGraph {
        self.graph.borrow().clone()
    }

    /// Whether the frame loop is scheduled.
    pub fn is_running(&self) -> bool {
        self.frames.is_running()
    }

    /// Stop stepping without losing the particles.
    pub fn pause(&self) {
        self.frames.pause();
    }

    /// Continue after [`pause`](Self::pause).
    pub fn resume(&self) {
        self.frames.resume();
    }

    /// Stop the loop for good.
    pub fn stop(&self) {
        self.frames.stop();
    }
}

fn fit_canvas<H: Host>(host: &H, canvas: &H::Node) -> Vec2 {
    let viewport = host.viewport();
    host.resize_canvas(canvas, viewport.width as u32, viewport.height as u32);
    Vec2::new(viewport.width as f32, viewport.height as f32)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::host::MemoryHost;

    fn options() -> NodeGraphOptions {
        NodeGraphOptions::default()
    }

    #[test]
    fn seeding_respects_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        let bounds = Vec2::new(1280.0, 800.0);
        let graph = NodeGraph::new(50, bounds, &options(), &mut rng);
        assert_eq!(graph.particles().len(), 50);
        for p in graph.particles() {
            assert!(p.position.cmpge(Vec2::ZERO).all() && p.position.cmple(bounds).all());
            assert!(p.velocity.x >= -0.25 && p.velocity.x < 0.25);
            assert!(p.velocity.y >= -0.25 && p.velocity.y < 0.25);
            assert!(p.radius >= 1.0 && p.radius < 3.0);
        }
    }

    #[test]
    fn particles_stay_in_bounds_from_any_start() {
        let bounds = Vec2::new(300.0, 200.0);
        let wild = vec![
            Particle {
                position: Vec2::new(-50.0, 900.0),
                velocity: Vec2::new(-3.0, 4.0),
                radius: 1.0,
            },
            Particle {
                position: Vec2::new(299.9, 0.1),
                velocity: Vec2::new(7.5, -9.0),
                radius: 2.0,
            },
        ];
        let mut graph = NodeGraph::with_particles(wild, bounds, &options());
        for _ in 0..500 {
            graph.update();
            for p in graph.particles() {
                assert!(p.position.x >= 0.0 && p.position.x <= bounds.x);
                assert!(p.position.y >= 0.0 && p.position.y <= bounds.y);
            }
        }
    }

    #[test]
    fn leaving_the_canvas_flips_velocity() {
        let mut p = Particle {
            position: Vec2::new(0.1, 50.0),
            velocity: Vec2::new(-0.2, 0.0),
            radius: 1.0,
        };
        p.update(Vec2::new(100.0, 100.0));
        assert_eq!(p.position.x, 0.0);
        assert!(p.velocity.x > 0.0);
    }

    #[test]
    fn links_fade_with_distance() {
        let at = |x: f32| Particle {
            position: Vec2::new(x, 10.0),
            velocity: Vec2::ZERO,
            radius: 1.0,
        };
        let graph = NodeGraph::with_particles(
            vec![at(0.0), at(60.0), at(200.0)],
            Vec2::new(400.0, 100.0),
            &options(),
        );
        let mut ops = Vec::new();
        graph.draw(&mut ops);

        assert!(matches!(ops[0], DrawOp::Clear { width, .. } if width == 400.0));
        let circles = ops.iter().filter(|op| matches!(op, DrawOp::Circle { .. })).count();
        assert_eq!(circles, 3);
        let lines: Vec<f32> = ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Line { alpha, width, color, .. } => {
                    assert_eq!(*width, 0.5);
                    assert_eq!(*color, Rgb(255, 243, 160));
                    Some(*alpha)
                }
                _ => None,
            })
            .collect();
        // Only the 0 to 60 pair is closer than 120 px.
        assert_eq!(lines.len(), 1);
        assert!((lines[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn frame_updates_before_drawing() {
        let p = Particle {
            position: Vec2::new(10.0, 10.0),
            velocity: Vec2::new(1.0, 0.0),
            radius: 1.0,
        };
        let mut graph =
            NodeGraph::with_particles(vec![p], Vec2::new(100.0, 100.0), &options());
        let ops = graph.frame();
        assert!(matches!(ops[1], DrawOp::Circle { center, .. } if center == Vec2::new(11.0, 10.0)));
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_hex("#fff3a0"), Some(Rgb(255, 243, 160)));
        assert_eq!(parse_hex("fff3a0"), None);
        assert_eq!(parse_hex("#fff"), None);
    }

    #[test]
    fn effect_paints_every_frame_and_follows_resize() {
        let host = Rc::new(MemoryHost::new());
        let subs = Rc::new(Subscriptions::new(Rc::clone(&host)));
        let mut rng = StdRng::seed_from_u64(1);
        let effect = NodeGraphEffect::install(&subs, &options(), 50, &mut rng)
            .unwrap()
            .unwrap();
        let canvas = *effect.canvas();
        assert_eq!(host.select("#node-graph-canvas"), Some(canvas));
        assert_eq!(host.style(canvas, "opacity").as_deref(), Some("0.3"));

        let _ = host.run_frame();
        let ops = host.painted(canvas);
        assert_eq!(ops.iter().filter(|o| matches!(o, DrawOp::Circle { .. })).count(), 50);

        host.resize_window(400.0, 300.0);
        assert_eq!(effect.graph().bounds(), Vec2::new(400.0, 300.0));

        effect.stop();
        subs.release();
        assert_eq!(host.pending_frames(), 0);
        assert!(host.select("#node-graph-canvas").is_none());
    }
}
