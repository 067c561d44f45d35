//! Discrete-event simulation engine.
//!
//! One engine runs one algorithm configuration on its own [`Network`].
//! Each iteration pops the next [`SimEvent`], advances the virtual clock
//! and dispatches to a handler, which may schedule further events.
//!
//! A request's life cycle:
//!
//! ```text
//! Request ──▶ Probe ─▶ Probe ─▶ … ─▶ (destination: pick wavelength)
//!                                          │
//!   Teardown ◀── (source) ◀── Confirmation ◀┘  reserve hop by hop
//!                                  │
//!                                  └─▶ Collision  wave already taken:
//!                                                 unwind reserved hops
//! ```
//!
//! Expected failures travel inside the messages as [`Failure`] values.
//! Handlers return [`FatalError`] only when bookkeeping is inconsistent;
//! the run stops at the first one.

use crate::clock::{SimClock, DEACTIVATION_TIME, TRAFFIC_HORIZON};
use crate::config::check_forward_reservation;
use crate::connection::EstablishedConnection;
use crate::error::FatalError;
use crate::event::{EventQueue, SimEvent};
use crate::metrics::{GlobalStats, RunLabel, RunMetrics};
use crate::request::{
    Attempt, CollisionNotice, Confirmation, ConnectionRequest, FanOut, Probe, ProbeStyle,
    RequestInfo, Teardown,
};
use crate::topology::Network;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp};
use rwasim_algorithms::{
    path_edges, path_spans, EdgeId, Failure, NetworkView, RouteRequest, RoutingAlgorithm,
    RoutingContext, RoutingKind, SessionId, WaveSelection, WavelengthAlgorithm, WavelengthKind,
};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

/// What one engine simulates.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub routing: RoutingKind,
    pub wavelength: WavelengthKind,
    pub probe_style: ProbeStyle,
    pub quality_aware: bool,
    /// Workstations generating traffic in this run.
    pub workstations: usize,
    pub max_probes: usize,
    pub seed: u64,
}

impl RunSettings {
    pub fn label(&self) -> RunLabel {
        RunLabel {
            routing: self.routing.name().to_string(),
            wavelength: self.wavelength.name().to_string(),
            probe_style: self.probe_style.name().to_string(),
            quality_aware: self.quality_aware,
            workstations: self.workstations,
        }
    }
}

/// Observable points in a request's life, recorded on demand.
#[derive(Debug, Clone, PartialEq)]
pub enum Milestone {
    Established {
        session: SessionId,
        time: f64,
        path: Vec<EdgeId>,
        wave: usize,
    },
    Failed {
        session: SessionId,
        time: f64,
        failure: Failure,
    },
    /// The last edge of an established connection was freed.
    Released { session: SessionId, time: f64 },
}

/// The four independent random streams of a run.
struct Streams {
    destination: ChaCha8Rng,
    duration: ChaCha8Rng,
    arrival: ChaCha8Rng,
    uniform: ChaCha8Rng,
}

impl Streams {
    fn seeded(seed: u64) -> Self {
        Self {
            destination: ChaCha8Rng::seed_from_u64(seed),
            duration: ChaCha8Rng::seed_from_u64(seed.wrapping_add(1)),
            arrival: ChaCha8Rng::seed_from_u64(seed.wrapping_add(2)),
            uniform: ChaCha8Rng::seed_from_u64(seed.wrapping_add(3)),
        }
    }
}

/// The main simulation engine.
pub struct SimulationEngine {
    /// Virtual clock.
    pub clock: SimClock,
    queue: EventQueue,
    network: Network,
    ctx: Arc<RoutingContext>,
    routing: Box<dyn RoutingAlgorithm>,
    wavelength: Box<dyn WavelengthAlgorithm>,
    settings: RunSettings,
    /// Counters of the current run.
    pub stats: GlobalStats,
    streams: Streams,
    holding: Exp<f64>,
    interarrival: Exp<f64>,
    sessions_per_workstation: u64,
    scripted: bool,
    result: Option<RunMetrics>,
    history: Option<Vec<Milestone>>,
    /// Total events processed.
    pub events_processed: u64,
}

impl SimulationEngine {
    pub fn new(
        mut network: Network,
        ctx: Arc<RoutingContext>,
        settings: RunSettings,
    ) -> Result<Self, FatalError> {
        check_forward_reservation(settings.routing, settings.wavelength, settings.probe_style)?;
        if settings.max_probes == 0 {
            return Err(FatalError::InvalidParameters("max_probes must be > 0".into()));
        }
        if network.wavelength_count() != ctx.wavelength_count() {
            return Err(FatalError::InvalidParameters(format!(
                "network carries {} wavelengths, quality grid {}",
                network.wavelength_count(),
                ctx.wavelength_count()
            )));
        }
        if network.router_count() != ctx.span_distance.len() {
            return Err(FatalError::TopologyRouters(format!(
                "routing context built for {} routers, network has {}",
                ctx.span_distance.len(),
                network.router_count()
            )));
        }

        let params = ctx.params().clone();
        let holding = Exp::new(1.0 / params.duration)
            .map_err(|e| FatalError::InvalidParameters(format!("duration: {}", e)))?;
        let interarrival = Exp::new(1.0 / params.arrival_interval)
            .map_err(|e| FatalError::InvalidParameters(format!("arrival_interval: {}", e)))?;
        let sessions_per_workstation = ((TRAFFIC_HORIZON / params.arrival_interval).floor() as u64).max(1);

        network.set_destination_distribution(params.dest_dist, &ctx.span_distance);

        Ok(Self {
            clock: SimClock::new(),
            queue: EventQueue::new(),
            network,
            routing: rwasim_algorithms::routing_by_kind(settings.routing),
            wavelength: rwasim_algorithms::wavelength_by_kind(settings.wavelength),
            streams: Streams::seeded(settings.seed),
            settings,
            ctx,
            stats: GlobalStats::default(),
            holding,
            interarrival,
            sessions_per_workstation,
            scripted: false,
            result: None,
            history: None,
            events_processed: 0,
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Keep a log of [`Milestone`]s for inspection after the run.
    pub fn record_history(&mut self) {
        self.history.get_or_insert_with(Vec::new);
    }

    pub fn history(&self) -> &[Milestone] {
        self.history.as_deref().unwrap_or(&[])
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Schedule an event at a given time.
    pub fn schedule_event(&mut self, time: f64, event: SimEvent) -> Result<(), FatalError> {
        self.queue.push(time, event)
    }

    /// Replace workstation traffic with an explicit list of requests.
    /// They do not regenerate; the run ends when the queue drains.
    pub fn load_requests(
        &mut self,
        requests: Vec<(f64, ConnectionRequest)>,
    ) -> Result<(), FatalError> {
        self.scripted = true;
        for (time, request) in requests {
            if request.src >= self.network.router_count()
                || request.dest >= self.network.router_count()
                || request.src == request.dest
            {
                return Err(FatalError::InvalidParameters(format!(
                    "scripted request {} -> {}",
                    request.src, request.dest
                )));
            }
            self.schedule_event(time, SimEvent::Request(request))?;
        }
        Ok(())
    }

    /// Run the simulation until all events are processed.
    pub fn run(&mut self) -> Result<RunMetrics, FatalError> {
        if !self.scripted {
            self.schedule_lifecycle()?;
        } else if self.settings.routing.uses_link_usage() {
            self.schedule_event(0.0, SimEvent::UpdateUsage)?;
        }

        while let Some((time, event)) = self.queue.pop() {
            self.clock.advance_to(time);
            let kind = event.kind_name();
            if let Err(e) = self.process_event(event) {
                log::error!(
                    "{}: {} while handling {} at t={:.6}",
                    self.settings.label().short(),
                    e,
                    kind,
                    time
                );
                return Err(e);
            }
            self.events_processed += 1;
        }

        if self.result.is_none() {
            self.finish()?;
        }
        self.result
            .take()
            .ok_or_else(|| FatalError::UnexpectedEvent("run produced no summary".into()))
    }

    fn schedule_lifecycle(&mut self) -> Result<(), FatalError> {
        if self.settings.workstations == 0
            || self.settings.workstations > self.network.workstations().len()
        {
            return Err(FatalError::WorkstationQuantity(format!(
                "{} active of {} attached",
                self.settings.workstations,
                self.network.workstations().len()
            )));
        }
        self.schedule_event(DEACTIVATION_TIME, SimEvent::Deactivate)?;
        self.schedule_event(0.0, SimEvent::Activate)?;
        if self.settings.routing.uses_link_usage() {
            self.schedule_event(0.0, SimEvent::UpdateUsage)?;
        }
        Ok(())
    }

    /// Process a single event.
    fn process_event(&mut self, event: SimEvent) -> Result<(), FatalError> {
        match event {
            SimEvent::Activate => self.handle_activate(),
            SimEvent::Deactivate => self.finish(),
            SimEvent::UpdateUsage => self.handle_update_usage(),
            SimEvent::Request(request) => self.handle_request(request),
            SimEvent::Probe(probe) => self.handle_probe(probe),
            SimEvent::Confirmation(confirmation) => self.handle_confirmation(confirmation),
            SimEvent::Collision(notice) => self.handle_collision(notice),
            SimEvent::Teardown(teardown) => self.handle_teardown(teardown),
        }
    }

    /// Propagation delay across `edge`. Forward reservation signals
    /// instantly.
    fn hop_delay(&self, edge: EdgeId) -> f64 {
        if self.settings.routing.forward_reservation() {
            0.0
        } else {
            self.ctx.propagation_delay(self.network.edge(edge).spans)
        }
    }

    fn record(&mut self, milestone: Milestone) {
        if let Some(history) = self.history.as_mut() {
            history.push(milestone);
        }
    }

    // --- Workstation traffic ---

    fn handle_activate(&mut self) -> Result<(), FatalError> {
        self.stats = GlobalStats::default();
        self.streams = Streams::seeded(self.settings.seed);
        self.routing.reset();
        self.network.reset_failures();
        self.network.reset_usage();
        self.network.reset_degradation();
        self.network.reset_edge_stats();

        let mut order: Vec<usize> = (0..self.network.workstations().len()).collect();
        order.shuffle(&mut self.streams.uniform);
        order.truncate(self.settings.workstations);
        log::debug!(
            "{}: activating workstations {:?}",
            self.settings.label().short(),
            order
        );
        for ws in order {
            self.schedule_request(ws, ws as u64 * self.sessions_per_workstation)?;
        }
        Ok(())
    }

    /// Next session id in a workstation's block, wrapping at its end.
    fn next_session(&self, ws: usize, session: SessionId) -> SessionId {
        let next = session + 1;
        if next % self.sessions_per_workstation == 0 {
            ws as u64 * self.sessions_per_workstation
        } else {
            next
        }
    }

    fn schedule_request(&mut self, ws: usize, session: SessionId) -> Result<(), FatalError> {
        let src = *self
            .network
            .workstations()
            .get(ws)
            .ok_or_else(|| FatalError::WorkstationParent(format!("workstation {}", ws)))?;
        let Some(dest) = self
            .network
            .draw_destination(src, &mut self.streams.destination)
        else {
            return Ok(());
        };
        let at = self.clock.now() + self.interarrival.sample(&mut self.streams.arrival);
        self.schedule_event(
            at,
            SimEvent::Request(ConnectionRequest {
                session,
                src,
                dest,
                workstation: Some(ws),
                duration: None,
            }),
        )
    }

    fn handle_update_usage(&mut self) -> Result<(), FatalError> {
        let q_stats = self.ctx.params().q_factor_stats;
        self.network.update_usage(q_stats);
        let next = self.clock.now() + self.ctx.params().usage_update_interval;
        if next < TRAFFIC_HORIZON {
            self.schedule_event(next, SimEvent::UpdateUsage)?;
        }
        Ok(())
    }

    // --- Request and probes ---

    fn handle_request(&mut self, request: ConnectionRequest) -> Result<(), FatalError> {
        self.stats.requests += 1;
        if let Some(ws) = request.workstation {
            if self.clock.within_traffic_horizon() {
                let next = self.next_session(ws, request.session);
                self.schedule_request(ws, next)?;
            }
        }

        let drawn = match request.duration {
            Some(d) => d,
            None => self.holding.sample(&mut self.streams.duration),
        };
        let duration = drawn.max(self.ctx.min_duration);

        let k = match self.settings.probe_style {
            ProbeStyle::Single => 1,
            _ => self.settings.max_probes,
        };
        let route = RouteRequest {
            src: request.src,
            dest: request.dest,
            k,
        };
        let started = Instant::now();
        let candidates =
            self.routing
                .compute_paths(&route, &self.network, &self.ctx, &mut self.streams.uniform);
        self.stats.routing_time += started.elapsed().as_secs_f64();

        let info = Rc::new(RequestInfo {
            session: request.session,
            src: request.src,
            dest: request.dest,
            begin: self.clock.now(),
            duration,
            candidates,
        });
        self.send_probes(info, 0, 0, None, false)
    }

    /// Choose the candidate slots to probe and launch them.
    ///
    /// `cursor` is the first slot a SERIAL retry may use; `max_sequence`
    /// is fixed by the first attempt.
    fn send_probes(
        &mut self,
        request: Rc<RequestInfo>,
        cursor: usize,
        sequence: usize,
        max_sequence: Option<usize>,
        quality_fail: bool,
    ) -> Result<(), FatalError> {
        let style = self.settings.probe_style;
        let forward = self.settings.routing.forward_reservation();
        let candidates = &request.candidates;

        let limit = match style {
            ProbeStyle::Single => 1,
            _ => self.settings.max_probes,
        };
        // IA returns one slot per wavelength; all of them are eligible.
        let window_end = if self.settings.routing == RoutingKind::ImpairmentAware {
            candidates.len()
        } else {
            limit.min(candidates.len())
        };
        let viable: Vec<usize> = (cursor..window_end)
            .filter(|&slot| candidates[slot].is_viable())
            .collect();

        let chosen: Vec<usize> = match style {
            ProbeStyle::Parallel => viable.clone(),
            _ if forward => match self.settings.wavelength {
                WavelengthKind::FirstFit | WavelengthKind::QualFirstFit => {
                    viable.first().copied().into_iter().collect()
                }
                WavelengthKind::BestFit => viable
                    .iter()
                    .copied()
                    .min_by(|&a, &b| candidates[a].cost.total_cmp(&candidates[b].cost))
                    .into_iter()
                    .collect(),
                other => {
                    return Err(FatalError::ForwardReservationWavelength(
                        other.name().to_string(),
                    ))
                }
            },
            _ => viable.first().copied().into_iter().collect(),
        };

        if chosen.is_empty() {
            let failure = if quality_fail {
                Failure::Quality
            } else {
                Failure::NoPath
            };
            self.finish_failure(request.session, request.src, failure);
            return Ok(());
        }

        let max_sequence = match style {
            ProbeStyle::Single => 1,
            ProbeStyle::Serial => max_sequence.unwrap_or(viable.len()),
            ProbeStyle::Parallel => chosen.len(),
        };
        if forward {
            if sequence == 0 {
                self.stats.probes_sent += 1;
            }
        } else {
            self.stats.probes_sent += chosen.len() as u64;
        }

        let fanout = (style == ProbeStyle::Parallel).then(|| FanOut::new(chosen.len()));
        let now = self.clock.now();
        for (i, slot) in chosen.into_iter().enumerate() {
            let candidate = &request.candidates[slot];
            let path = path_edges(&self.network, &candidate.routers)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    FatalError::AlgorithmInput(format!(
                        "{} returned {:?}, which is not a path",
                        self.routing.name(),
                        candidate.routers
                    ))
                })?;
            let wave = if forward {
                let w = match self.settings.routing {
                    RoutingKind::ImpairmentAware => slot,
                    _ => candidate.cost as usize,
                };
                if w >= self.network.wavelength_count() {
                    return Err(FatalError::WavelengthSelection(format!(
                        "{} preassigned wavelength {}",
                        self.routing.name(),
                        w
                    )));
                }
                Some(w)
            } else {
                None
            };
            let attempt = Attempt {
                slot,
                sequence: if style == ProbeStyle::Parallel { i } else { sequence },
                max_sequence,
                quality_fail,
            };
            let at = now + self.hop_delay(path[0]);
            let probe = Probe {
                request: Rc::clone(&request),
                path,
                attempt,
                wave,
                hop: 0,
                fanout: fanout.clone(),
            };
            self.schedule_event(at, SimEvent::Probe(probe))?;
        }
        Ok(())
    }

    fn handle_probe(&mut self, mut probe: Probe) -> Result<(), FatalError> {
        probe.hop += 1;
        if probe.hop < probe.path.len() {
            let at = self.clock.now() + self.hop_delay(probe.path[probe.hop]);
            return self.schedule_event(at, SimEvent::Probe(probe));
        }
        self.probe_at_destination(probe)
    }

    /// A probe reached its destination. Under PARALLEL it waits while a
    /// sibling holds a valid decision.
    fn probe_at_destination(&mut self, probe: Probe) -> Result<(), FatalError> {
        if let Some(fan) = probe.fanout.clone() {
            let mut f = fan.borrow_mut();
            let seq = probe.attempt.sequence;
            let sibling = f
                .siblings
                .get_mut(seq)
                .ok_or(FatalError::ProbesReceived(probe.request.session))?;
            sibling.at_destination = true;
            if f.holds_valid_decision() {
                f.siblings[seq].parked = Some(probe);
                return Ok(());
            }
        }
        self.decide(probe)
    }

    /// Forward-reserved wavelength check: free everywhere and, when
    /// quality-aware, above threshold.
    fn check_preassigned(&self, wave: usize, path: &[EdgeId]) -> Result<usize, Failure> {
        if !path
            .iter()
            .all(|&e| self.network.wave_status(e, wave).is_free())
        {
            return Err(Failure::NoPath);
        }
        if self.settings.quality_aware
            && self.ctx.estimator.q_factor(wave, path, &self.network) < self.ctx.th_q
        {
            return Err(Failure::Quality);
        }
        Ok(wave)
    }

    fn decide(&mut self, probe: Probe) -> Result<(), FatalError> {
        let now = self.clock.now();
        let seq = probe.attempt.sequence;
        if let Some(fan) = &probe.fanout {
            fan.borrow_mut().siblings[seq].decided_at = Some(now);
        }

        let selection = WaveSelection {
            src: probe.request.src,
            dest: probe.request.dest,
            path: &probe.path,
            quality_aware: self.settings.quality_aware,
        };
        let started = Instant::now();
        let mut outcome = match probe.wave {
            Some(w) => self.check_preassigned(w, &probe.path),
            None => self.wavelength.choose(&selection, &self.network, &self.ctx),
        };
        // DP may still find another wavelength on the same path.
        if outcome.is_err()
            && probe.wave.is_some()
            && self.settings.routing == RoutingKind::DynamicProgramming
        {
            outcome = self.wavelength.choose(&selection, &self.network, &self.ctx);
        }
        self.stats.routing_time += started.elapsed().as_secs_f64();

        if outcome == Err(Failure::NoPath) {
            let sibling_quality = probe
                .fanout
                .as_ref()
                .is_some_and(|f| f.borrow().sibling_failed_quality(seq));
            let serial_quality =
                self.settings.probe_style == ProbeStyle::Serial && probe.attempt.quality_fail;
            if sibling_quality || serial_quality {
                outcome = Err(Failure::Quality);
            }
        }
        if let Some(fan) = &probe.fanout {
            fan.borrow_mut().siblings[seq].outcome = Some(outcome);
        }

        match outcome {
            Ok(w) => {
                let estimate = self.ctx.estimator.estimate(w, &probe.path, &self.network);
                self.stats.record_noise(&estimate.noise);
            }
            Err(_) => {
                if let Some(fan) = probe.fanout.clone() {
                    let parked = fan.borrow_mut().take_parked();
                    if let Some(next) = parked {
                        return self.probe_at_destination(next);
                    }
                    if fan.borrow().any_travelling() {
                        return Ok(());
                    }
                }
            }
        }

        let position = probe.path.len() - 1;
        let at = now + self.hop_delay(probe.path[position]);
        self.schedule_event(
            at,
            SimEvent::Confirmation(Confirmation {
                request: probe.request,
                path: probe.path,
                attempt: probe.attempt,
                outcome,
                position,
                final_failure: false,
                fanout: probe.fanout,
            }),
        )
    }

    // --- Confirmation, collision and teardown ---

    fn handle_confirmation(&mut self, mut c: Confirmation) -> Result<(), FatalError> {
        let edge = *c.path.get(c.position).ok_or_else(|| FatalError::InvalidConfirmation {
            session: c.request.session,
            reason: format!("position {} beyond path of {}", c.position, c.path.len()),
        })?;
        if let Ok(wave) = c.outcome {
            if self.network.wave_status(edge, wave).is_used() {
                let final_failure = match &c.fanout {
                    Some(fan) => fan.borrow().collision_is_final(c.attempt.sequence),
                    None => true,
                };
                c.final_failure = final_failure;
                c.outcome = Err(Failure::Collision);
                log::trace!(
                    "session {} collided on edge {} wave {} (final: {})",
                    c.request.session,
                    edge,
                    wave,
                    final_failure
                );
                let notice = CollisionNotice {
                    request: Rc::clone(&c.request),
                    path: c.path.clone(),
                    attempt: c.attempt,
                    wave,
                    hop: c.position + 1,
                    final_failure,
                    fanout: c.fanout.clone(),
                };
                let at = self.clock.now() + self.hop_delay(edge);
                self.schedule_event(at, SimEvent::Collision(notice))?;
            } else {
                self.network.set_used(edge, wave, c.request.session)?;
            }
        }

        if c.position == 0 {
            return self.complete(c);
        }
        c.position -= 1;
        let at = self.clock.now() + self.hop_delay(c.path[c.position]);
        self.schedule_event(at, SimEvent::Confirmation(c))
    }

    /// The confirmation is back at the source.
    fn complete(&mut self, c: Confirmation) -> Result<(), FatalError> {
        let failure = match c.outcome {
            Ok(wave) => return self.establish(c, wave),
            Err(failure) => failure,
        };
        if self.settings.probe_style == ProbeStyle::Serial
            && c.attempt.sequence + 1 < c.attempt.max_sequence
        {
            return self.send_probes(
                c.request,
                c.attempt.slot + 1,
                c.attempt.sequence + 1,
                Some(c.attempt.max_sequence),
                failure == Failure::Quality,
            );
        }
        // A non-final collision hands over to a sibling once unwound.
        if failure == Failure::Collision && !c.final_failure {
            return Ok(());
        }
        self.finish_failure(c.request.session, c.request.src, failure);
        Ok(())
    }

    fn finish_failure(&mut self, session: SessionId, src: usize, failure: Failure) {
        let aqos = self.settings.routing == RoutingKind::AdaptiveQos;
        match failure {
            Failure::Collision => self.stats.collisions += 1,
            Failure::Quality => {
                if aqos {
                    self.network.record_quality_failure(src);
                }
                self.stats.quality_failures += 1;
            }
            Failure::NoPath => {
                if aqos {
                    self.network.record_wavelength_failure(src);
                }
                self.stats.no_path_failures += 1;
            }
        }
        let time = self.clock.now();
        self.record(Milestone::Failed {
            session,
            time,
            failure,
        });
    }

    fn establish(&mut self, c: Confirmation, wave: usize) -> Result<(), FatalError> {
        let now = self.clock.now();
        let request = &c.request;
        let forward = self.settings.routing.forward_reservation();

        self.stats.successes += 1;
        self.stats.setup_delay_total += if forward {
            self.ctx
                .propagation_delay(self.ctx.spans_between(request.src, request.dest))
        } else {
            now - request.begin
        };
        let spans = path_spans(&self.network, &c.path);
        self.stats.hop_total += c.path.len() as u64;
        self.stats.span_total += spans as u64;

        let end = now + request.duration;
        let q_stats = self.ctx.params().q_factor_stats;
        let degradation = self.settings.routing.uses_degradation();
        let connection = if q_stats || degradation {
            let id = self.network.next_connection_id();
            self.network.register_connection(EstablishedConnection::new(
                id,
                request.session,
                request.src,
                request.dest,
                c.path.clone(),
                wave,
                now,
                end,
            ));
            Some(id)
        } else {
            None
        };
        if degradation {
            self.network
                .refresh_degradation(&c.path, wave, &self.ctx.estimator);
        }
        if q_stats {
            self.network
                .sample_q_factors(&c.path, wave, &self.ctx.estimator, now);
        }

        if self.ctx.params().detailed_log {
            log::debug!(
                "{}: session {} {} -> {} on wave {} over {} hops / {} spans until {:.6}",
                self.settings.label().short(),
                request.session,
                request.src,
                request.dest,
                wave,
                c.path.len(),
                spans,
                end
            );
        }
        self.record(Milestone::Established {
            session: request.session,
            time: now,
            path: c.path.clone(),
            wave,
        });

        let teardown = Teardown {
            request: Rc::clone(&c.request),
            path: c.path,
            wave,
            hop: 0,
            connection,
            fanout: c.fanout,
        };
        self.schedule_event(end, SimEvent::Teardown(teardown))
    }

    /// Free the reservations a collided confirmation made past the
    /// colliding edge, then let a parked sibling try.
    fn handle_collision(&mut self, mut n: CollisionNotice) -> Result<(), FatalError> {
        if let Some(&edge) = n.path.get(n.hop) {
            self.network.set_free(edge, n.wave)?;
            n.hop += 1;
            let at = self.clock.now() + self.hop_delay(edge);
            return self.schedule_event(at, SimEvent::Collision(n));
        }

        if n.final_failure {
            return Ok(());
        }
        let Some(fan) = n.fanout.clone() else {
            return Ok(());
        };
        let parked = {
            let mut f = fan.borrow_mut();
            let sibling = f
                .siblings
                .get_mut(n.attempt.sequence)
                .ok_or(FatalError::ProbesReceived(n.request.session))?;
            sibling.outcome = Some(Err(Failure::Collision));
            f.take_parked()
        };
        match parked {
            Some(probe) => self.probe_at_destination(probe),
            None => Ok(()),
        }
    }

    fn handle_teardown(&mut self, mut t: Teardown) -> Result<(), FatalError> {
        let now = self.clock.now();
        if t.hop == 0 {
            if let Some(id) = t.connection {
                let connection = self.network.deregister_connection(id).ok_or_else(|| {
                    FatalError::QFactorMonitor(format!(
                        "connection {} of session {} is not registered",
                        id, t.request.session
                    ))
                })?;
                if self.ctx.params().q_factor_stats {
                    if let Some(summary) = connection.summarize(now, self.ctx.th_q) {
                        self.network.fold_edge_stats(&connection.path, &summary);
                        self.stats.fold_connection(&summary);
                    }
                }
            }
        }

        let edge = *t.path.get(t.hop).ok_or_else(|| FatalError::InvalidConfirmation {
            session: t.request.session,
            reason: format!("teardown hop {} beyond path of {}", t.hop, t.path.len()),
        })?;
        self.network.set_free(edge, t.wave)?;
        t.hop += 1;
        if t.hop < t.path.len() {
            let at = now + self.hop_delay(edge);
            return self.schedule_event(at, SimEvent::Teardown(t));
        }

        // Whole path released: neighbours see the new interference.
        if t.connection.is_some() {
            if self.settings.routing.uses_degradation() {
                self.network.clear_degradation(&t.path, t.wave);
                self.network
                    .refresh_degradation(&t.path, t.wave, &self.ctx.estimator);
            }
            if self.ctx.params().q_factor_stats {
                self.network
                    .sample_q_factors(&t.path, t.wave, &self.ctx.estimator, now);
            }
        }
        self.record(Milestone::Released {
            session: t.request.session,
            time: now,
        });
        Ok(())
    }

    /// Verify every wavelength is free and publish the summary.
    fn finish(&mut self) -> Result<(), FatalError> {
        self.network.verify_all_free()?;
        let metrics = RunMetrics::from_stats(
            self.settings.label(),
            self.stats.clone(),
            self.ctx.params().q_factor_stats,
        );
        for line in metrics.log_lines() {
            log::info!("{}", line);
        }
        self.result = Some(metrics);
        Ok(())
    }
}
