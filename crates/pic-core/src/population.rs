// ─────────────────────────────────────────────────────────────────────
// SCPN Plasma PIC — Particle Population
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! The particle population: a stable particle arena plus one index
//! vector per mesh cell.
//!
//! The central invariant: exactly one cell's vector references a given
//! particle at any instant outside an in-progress update pass.
//! External integrators mutate particle state in place
//! between passes; [`Population::update`] then re-buckets every
//! particle and reports boundary crossings to the charge sinks.

use std::collections::HashMap;

use log::debug;
use ndarray::ArrayView2;
use rand::Rng;

use pic_types::config::{NormalizationPolicy, PopulationConfig, SpeciesConfig};
use pic_types::error::{PicError, PicResult};

use crate::locator::{Location, Locator};
use crate::mesh::{Mesh, Point};
use crate::sampling;
use crate::species::{SpeciesHandle, SpeciesRegistry};
use crate::topology::MeshTopology;

/// One charged macro-particle. Components of `pos` and `vel` beyond
/// the mesh dimension stay zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub pos: Point,
    pub vel: Point,
    pub charge: f64,
    pub mass: f64,
}

impl Particle {
    pub fn new(pos: Point, vel: Point, charge: f64, mass: f64) -> PicResult<Self> {
        if pos.iter().chain(vel.iter()).any(|c| !c.is_finite()) {
            return Err(PicError::ConfigError(
                "particle position and velocity must be finite".to_string(),
            ));
        }
        if !charge.is_finite() || charge == 0.0 {
            return Err(PicError::ConfigError(format!(
                "particle charge must be finite and nonzero, got {charge}"
            )));
        }
        if !mass.is_finite() || mass == 0.0 {
            return Err(PicError::ConfigError(format!(
                "particle mass must be finite and nonzero, got {mass}"
            )));
        }
        Ok(Particle {
            pos,
            vel,
            charge,
            mass,
        })
    }
}

/// Stable handle into the particle arena. Cell vectors store these, so
/// swap-removal never invalidates references held elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleId(u32);

#[derive(Debug, Clone)]
enum Slot {
    Occupied(Particle),
    Vacant { next_free: Option<u32> },
}

/// Slab arena with a free list: O(1) insert and remove, slot reuse.
#[derive(Debug, Clone, Default)]
pub struct ParticleArena {
    slots: Vec<Slot>,
    free_head: Option<u32>,
    len: usize,
}

impl ParticleArena {
    pub fn with_capacity(capacity: usize) -> Self {
        ParticleArena {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, particle: Particle) -> ParticleId {
        self.len += 1;
        match self.free_head {
            Some(idx) => {
                let slot = &mut self.slots[idx as usize];
                self.free_head = match slot {
                    Slot::Vacant { next_free } => *next_free,
                    Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
                };
                *slot = Slot::Occupied(particle);
                ParticleId(idx)
            }
            None => {
                self.slots.push(Slot::Occupied(particle));
                ParticleId((self.slots.len() - 1) as u32)
            }
        }
    }

    pub fn get(&self, id: ParticleId) -> Option<&Particle> {
        match self.slots.get(id.0 as usize) {
            Some(Slot::Occupied(p)) => Some(p),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        match self.slots.get_mut(id.0 as usize) {
            Some(Slot::Occupied(p)) => Some(p),
            _ => None,
        }
    }

    pub fn remove(&mut self, id: ParticleId) -> Option<Particle> {
        let slot = self.slots.get_mut(id.0 as usize)?;
        if matches!(slot, Slot::Vacant { .. }) {
            return None;
        }
        let old = std::mem::replace(
            slot,
            Slot::Vacant {
                next_free: self.free_head,
            },
        );
        self.free_head = Some(id.0);
        self.len -= 1;
        match old {
            Slot::Occupied(p) => Some(p),
            Slot::Vacant { .. } => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParticleId, &Particle)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Occupied(p) => Some((ParticleId(i as u32), p)),
            Slot::Vacant { .. } => None,
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ParticleId, &mut Particle)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| match slot {
                Slot::Occupied(p) => Some((ParticleId(i as u32), p)),
                Slot::Vacant { .. } => None,
            })
    }
}

/// Receiver for the charge of particles absorbed through a boundary.
/// Keyed by boundary marker; the population never sees the body's
/// representation beyond this capability.
pub trait ChargeSink {
    fn boundary_id(&self) -> u32;
    fn add_charge(&mut self, delta: f64);
}

/// Minimal absorbing body: a boundary marker and an additive charge
/// accumulator feeding the field solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsorbingBody {
    pub boundary_id: u32,
    pub charge: f64,
}

impl AbsorbingBody {
    pub fn new(boundary_id: u32) -> Self {
        AbsorbingBody {
            boundary_id,
            charge: 0.0,
        }
    }
}

impl ChargeSink for AbsorbingBody {
    fn boundary_id(&self) -> u32 {
        self.boundary_id
    }

    fn add_charge(&mut self, delta: f64) {
        self.charge += delta;
    }
}

/// Outcome of one update pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateReport {
    /// Particles re-bucketed into a different cell.
    pub moved: usize,
    /// Particles absorbed by a registered charge sink.
    pub absorbed: usize,
    /// Particles lost through an unclaimed boundary.
    pub escaped: usize,
}

/// Initial-loading options for [`Population::init_new_species`].
pub struct LoadOptions<'p> {
    /// Spatial density profile for rejection sampling; uniform when
    /// absent.
    pub pdf: Option<&'p (dyn Fn(&[f64]) -> f64 + Sync)>,
    /// Upper bound of the profile over the domain.
    pub pdf_max: f64,
    /// Register the species without loading particles (snapshot
    /// restarts load them separately).
    pub empty: bool,
}

impl Default for LoadOptions<'_> {
    fn default() -> Self {
        LoadOptions {
            pdf: None,
            pdf_max: 1.0,
            empty: false,
        }
    }
}

/// Particle population over a fixed mesh.
#[derive(Debug, Clone)]
pub struct Population<'a, M: Mesh> {
    locator: Locator<'a, M>,
    dim: usize,
    arena: ParticleArena,
    cells: Vec<Vec<ParticleId>>,
    species: SpeciesRegistry,
    densities: Vec<f64>,
}

impl<'a, M: Mesh> Population<'a, M> {
    pub fn new(
        mesh: &'a M,
        topology: &'a MeshTopology,
        policy: NormalizationPolicy,
    ) -> PicResult<Self> {
        let locator = Locator::new(mesh, topology)?;
        let species = SpeciesRegistry::new(mesh.volume(), mesh.num_cells(), policy)?;
        Ok(Population {
            locator,
            dim: mesh.dim(),
            arena: ParticleArena::default(),
            cells: vec![Vec::new(); mesh.num_cells()],
            species,
            densities: Vec::new(),
        })
    }

    /// Build a population and load every species of a configuration
    /// record, in order.
    pub fn from_config<R: Rng>(
        mesh: &'a M,
        topology: &'a MeshTopology,
        config: &PopulationConfig,
        rng: &mut R,
    ) -> PicResult<Self>
    where
        M: Sync,
    {
        let mut population = Self::new(mesh, topology, config.normalization)?;
        for species in &config.species {
            population.init_new_species(species, &LoadOptions::default(), rng)?;
        }
        Ok(population)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn species(&self) -> &SpeciesRegistry {
        &self.species
    }

    pub fn locator(&self) -> &Locator<'a, M> {
        &self.locator
    }

    /// Mean plasma density recorded at load time for a species.
    pub fn plasma_density(&self, handle: SpeciesHandle) -> f64 {
        self.densities[handle.index()]
    }

    /// Register a species without loading any particles.
    pub fn register_species(&mut self, config: &SpeciesConfig) -> PicResult<SpeciesHandle> {
        let handle = self.species.register(config)?;
        let s = self.species.get(handle);
        self.densities
            .push(s.num_total as f64 / self.species.volume());
        Ok(handle)
    }

    /// Register a species and populate the domain with `num_total`
    /// particles drawn from the spatial profile and a drifting
    /// Maxwellian at the species' normalized velocities.
    pub fn init_new_species<R: Rng>(
        &mut self,
        config: &SpeciesConfig,
        options: &LoadOptions,
        rng: &mut R,
    ) -> PicResult<SpeciesHandle>
    where
        M: Sync,
    {
        let handle = self.register_species(config)?;
        if options.empty {
            return Ok(handle);
        }
        let s = self.species.get(handle).clone();
        let xs = sampling::random_domain_points(
            &self.locator,
            options.pdf,
            options.pdf_max,
            s.num_total,
            rng,
        )?;
        let vs = sampling::maxwellian(s.v_thermal, &s.v_drift, s.num_total, self.dim, rng)?;
        let added = self.add_particles(xs.view(), vs.view(), &[s.charge], &[s.mass])?;
        debug!(
            "species {}: loaded {added} of {} particles",
            handle.index(),
            s.num_total
        );
        Ok(handle)
    }

    /// Add particles from coordinate blocks of shape `(n, dim)`.
    ///
    /// `velocities` may have a single row and `charges`/`masses` a
    /// single element to broadcast one value over all positions.
    /// Particles landing in no local cell are silently dropped (the
    /// hook a distributed particle exchange would extend); the count
    /// actually added is returned.
    pub fn add_particles(
        &mut self,
        positions: ArrayView2<f64>,
        velocities: ArrayView2<f64>,
        charges: &[f64],
        masses: &[f64],
    ) -> PicResult<usize>
    where
        M: Sync,
    {
        let n = positions.nrows();
        if n == 0 {
            return Ok(0);
        }
        if positions.ncols() != self.dim || velocities.ncols() != self.dim {
            return Err(PicError::ConfigError(format!(
                "coordinate blocks must have {} columns, got positions {} and velocities {}",
                self.dim,
                positions.ncols(),
                velocities.ncols()
            )));
        }
        if velocities.nrows() != n && velocities.nrows() != 1 {
            return Err(PicError::ConfigError(format!(
                "velocity rows must be 1 or {n}, got {}",
                velocities.nrows()
            )));
        }
        if charges.len() != n && charges.len() != 1 {
            return Err(PicError::ConfigError(format!(
                "charge count must be 1 or {n}, got {}",
                charges.len()
            )));
        }
        if masses.len() != n && masses.len() != 1 {
            return Err(PicError::ConfigError(format!(
                "mass count must be 1 or {n}, got {}",
                masses.len()
            )));
        }

        let mut points = Vec::with_capacity(n);
        for row in positions.rows() {
            let mut x = [0.0; 3];
            for (k, &c) in row.iter().enumerate() {
                x[k] = c;
            }
            points.push(x);
        }
        let located = self.locator.locate_batch(&points);

        let mut added = 0usize;
        for (i, (x, cell)) in points.into_iter().zip(located).enumerate() {
            let Some(cell) = cell else { continue };
            let vrow = velocities.row(if velocities.nrows() == 1 { 0 } else { i });
            let mut v = [0.0; 3];
            for (k, &c) in vrow.iter().enumerate() {
                v[k] = c;
            }
            let q = charges[if charges.len() == 1 { 0 } else { i }];
            let m = masses[if masses.len() == 1 { 0 } else { i }];
            let id = self.arena.insert(Particle::new(x, v, q, m)?);
            self.cells[cell].push(id);
            added += 1;
        }
        if added < n {
            debug!("dropped {} of {n} particles outside the local mesh", n - added);
        }
        Ok(added)
    }

    /// Add particles with the normalized charge and mass of a
    /// registered species.
    pub fn add_particles_of_species(
        &mut self,
        handle: SpeciesHandle,
        positions: ArrayView2<f64>,
        velocities: ArrayView2<f64>,
    ) -> PicResult<usize>
    where
        M: Sync,
    {
        let s = self.species.get(handle);
        let (q, m) = (s.charge, s.mass);
        self.add_particles(positions, velocities, &[q], &[m])
    }

    /// Re-bucket every particle after positions were advanced.
    ///
    /// The pass snapshots the (cell, particle) pairs before mutating,
    /// so each particle is relocated exactly once per call regardless
    /// of where it lands. Boundary crossings deposit the particle's
    /// charge on the sink registered for that marker, or destroy the
    /// particle without transfer when no sink claims it.
    pub fn update<S: ChargeSink>(&mut self, sinks: &mut [S]) -> PicResult<UpdateReport> {
        let mut sink_by_marker: HashMap<u32, usize> = HashMap::with_capacity(sinks.len());
        for (i, sink) in sinks.iter().enumerate() {
            if sink_by_marker.insert(sink.boundary_id(), i).is_some() {
                return Err(PicError::ConfigError(format!(
                    "two charge sinks registered for boundary marker {}",
                    sink.boundary_id()
                )));
            }
        }

        let mut report = UpdateReport::default();
        let snapshots: Vec<Vec<ParticleId>> = self.cells.clone();
        for (cell_id, snapshot) in snapshots.into_iter().enumerate() {
            let mut to_delete: Vec<usize> = Vec::new();
            for (idx, id) in snapshot.into_iter().enumerate() {
                let particle = *self.arena.get(id).ok_or_else(|| {
                    PicError::Bookkeeping(format!(
                        "cell {cell_id} references a particle no longer in the arena"
                    ))
                })?;
                match self.locator.relocate(&particle.pos, cell_id)? {
                    Location::Cell(dest) if dest == cell_id => {}
                    Location::Cell(dest) => {
                        to_delete.push(idx);
                        self.cells[dest].push(id);
                        report.moved += 1;
                    }
                    Location::Boundary(marker) => {
                        to_delete.push(idx);
                        let removed = self.arena.remove(id).ok_or_else(|| {
                            PicError::Bookkeeping(format!(
                                "particle in cell {cell_id} vanished during the update pass"
                            ))
                        })?;
                        if let Some(&sink) = sink_by_marker.get(&marker) {
                            sinks[sink].add_charge(removed.charge);
                            report.absorbed += 1;
                        } else {
                            report.escaped += 1;
                        }
                    }
                }
            }
            remove_descending(&mut self.cells[cell_id], &to_delete);
        }

        debug!(
            "update pass: {} moved, {} absorbed, {} escaped, {} remain",
            report.moved,
            report.absorbed,
            report.escaped,
            self.arena.len()
        );
        Ok(report)
    }

    pub fn num_particles(&self) -> usize {
        self.arena.len()
    }

    /// Number of particles satisfying a predicate, e.g.
    /// `pop.num_matching(|p| p.charge < 0.0)`.
    pub fn num_matching<F: Fn(&Particle) -> bool>(&self, predicate: F) -> usize {
        self.arena.iter().filter(|(_, p)| predicate(p)).count()
    }

    pub fn num_positives(&self) -> usize {
        self.num_matching(|p| p.charge > 0.0)
    }

    pub fn num_negatives(&self) -> usize {
        self.num_matching(|p| p.charge < 0.0)
    }

    /// All particles, in arena order.
    pub fn particles(&self) -> impl Iterator<Item = (ParticleId, &Particle)> {
        self.arena.iter()
    }

    /// Mutable access for external integrators between update passes.
    pub fn particles_mut(&mut self) -> impl Iterator<Item = (ParticleId, &mut Particle)> {
        self.arena.iter_mut()
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.arena.get(id)
    }

    /// Particle ids currently bucketed in a cell (unordered).
    pub fn cell_particle_ids(&self, cell: usize) -> &[ParticleId] {
        &self.cells[cell]
    }

    /// Particles currently bucketed in a cell.
    pub fn cell_particles(&self, cell: usize) -> impl Iterator<Item = &Particle> {
        self.cells[cell].iter().filter_map(|&id| self.arena.get(id))
    }
}

/// Delete the listed indices (ascending) from an unordered vector by
/// swap-removal, walking them in descending order so earlier removals
/// do not invalidate later indices.
fn remove_descending(list: &mut Vec<ParticleId>, to_delete: &[usize]) {
    for &idx in to_delete.iter().rev() {
        list.swap_remove(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{TriangleMesh, OBJECT_MARKER};
    use ndarray::{array, Array2};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn square_mesh(n: usize) -> (TriangleMesh, MeshTopology) {
        let mesh = TriangleMesh::rectangle(n, n, 1.0, 1.0).expect("mesh");
        let topo = MeshTopology::build(&mesh, mesh.facet_markers()).expect("topology");
        (mesh, topo)
    }

    fn sample_particle(x: f64, y: f64) -> Particle {
        Particle::new([x, y, 0.0], [0.0; 3], -1.0, 1.0).expect("particle")
    }

    #[test]
    fn test_particle_rejects_zero_charge_or_mass() {
        assert!(Particle::new([0.0; 3], [0.0; 3], 0.0, 1.0).is_err());
        assert!(Particle::new([0.0; 3], [0.0; 3], 1.0, 0.0).is_err());
        assert!(Particle::new([f64::NAN; 3], [0.0; 3], 1.0, 1.0).is_err());
    }

    #[test]
    fn test_arena_insert_remove_reuse() {
        let mut arena = ParticleArena::default();
        let a = arena.insert(sample_particle(0.1, 0.1));
        let b = arena.insert(sample_particle(0.2, 0.2));
        assert_eq!(arena.len(), 2);
        assert!(arena.get(a).is_some());

        let removed = arena.remove(a).expect("occupied");
        assert_eq!(removed.pos[0], 0.1);
        assert!(arena.get(a).is_none());
        assert!(arena.remove(a).is_none());
        assert_eq!(arena.len(), 1);

        // Freed slot is reused before the arena grows.
        let c = arena.insert(sample_particle(0.3, 0.3));
        assert_eq!(c, a);
        assert_eq!(arena.len(), 2);
        assert!(arena.get(b).is_some());
    }

    #[test]
    fn test_add_particles_broadcast_and_counts() {
        let (mesh, topo) = square_mesh(4);
        let mut pop =
            Population::new(&mesh, &topo, NormalizationPolicy::Identity).expect("population");
        let xs = array![[0.1, 0.1], [0.6, 0.4], [0.9, 0.9]];
        let vs = array![[0.5, 0.0]];
        let added = pop
            .add_particles(xs.view(), vs.view(), &[-1.0], &[1.0])
            .expect("add");
        assert_eq!(added, 3);
        assert_eq!(pop.num_particles(), 3);
        assert_eq!(pop.num_negatives(), 3);
        assert_eq!(pop.num_positives(), 0);
        for (_, p) in pop.particles() {
            assert_eq!(p.vel, [0.5, 0.0, 0.0]);
        }
        // Each particle sits in the cell that contains it.
        let bucketed: usize = (0..pop.num_cells())
            .map(|c| pop.cell_particle_ids(c).len())
            .sum();
        assert_eq!(bucketed, 3);
    }

    #[test]
    fn test_add_particles_drops_points_outside_mesh() {
        let (mesh, topo) = square_mesh(2);
        let mut pop =
            Population::new(&mesh, &topo, NormalizationPolicy::Identity).expect("population");
        let xs = array![[0.5, 0.5], [1.5, 0.5], [-0.1, 0.2]];
        let vs = Array2::zeros((1, 2));
        let added = pop
            .add_particles(xs.view(), vs.view(), &[1.0], &[1.0])
            .expect("add");
        assert_eq!(added, 1);
        assert_eq!(pop.num_particles(), 1);
    }

    #[test]
    fn test_add_particles_shape_guards() {
        let (mesh, topo) = square_mesh(2);
        let mut pop =
            Population::new(&mesh, &topo, NormalizationPolicy::Identity).expect("population");
        let xs = array![[0.5, 0.5], [0.2, 0.2]];
        let bad_vs = Array2::zeros((3, 2));
        assert!(pop
            .add_particles(xs.view(), bad_vs.view(), &[1.0], &[1.0])
            .is_err());
        let vs = Array2::zeros((2, 2));
        assert!(pop
            .add_particles(xs.view(), vs.view(), &[1.0, 2.0, 3.0], &[1.0])
            .is_err());
        let bad_xs = array![[0.5, 0.5, 0.0]];
        assert!(pop
            .add_particles(bad_xs.view(), vs.view(), &[1.0], &[1.0])
            .is_err());
    }

    #[test]
    fn test_update_without_motion_changes_nothing() {
        let (mesh, topo) = square_mesh(4);
        let mut pop =
            Population::new(&mesh, &topo, NormalizationPolicy::Identity).expect("population");
        let xs = array![[0.1, 0.1], [0.4, 0.7], [0.8, 0.3]];
        let vs = Array2::zeros((1, 2));
        pop.add_particles(xs.view(), vs.view(), &[1.0], &[1.0])
            .expect("add");
        let before = pop.num_particles();
        let report = pop.update::<AbsorbingBody>(&mut []).expect("update");
        assert_eq!(report, UpdateReport::default());
        assert_eq!(pop.num_particles(), before);
    }

    #[test]
    fn test_update_moves_particle_to_containing_cell() {
        let (mesh, topo) = square_mesh(4);
        let mut pop =
            Population::new(&mesh, &topo, NormalizationPolicy::Identity).expect("population");
        let xs = array![[0.1, 0.1]];
        let vs = Array2::zeros((1, 2));
        pop.add_particles(xs.view(), vs.view(), &[1.0], &[1.0])
            .expect("add");

        // Drag the particle across the domain.
        for (_, p) in pop.particles_mut() {
            p.pos = [0.85, 0.9, 0.0];
        }
        let report = pop.update::<AbsorbingBody>(&mut []).expect("update");
        assert_eq!(report.moved, 1);
        assert_eq!(pop.num_particles(), 1);

        let (_, p) = pop.particles().next().expect("particle");
        let home = pop.locator().locate(&p.pos).expect("containing cell");
        assert_eq!(pop.cell_particle_ids(home).len(), 1);
        let elsewhere: usize = (0..pop.num_cells())
            .filter(|&c| c != home)
            .map(|c| pop.cell_particle_ids(c).len())
            .sum();
        assert_eq!(elsewhere, 0);
    }

    #[test]
    fn test_update_relocates_each_particle_exactly_once() {
        // Every particle shifted by the same offset: the pass must
        // produce exactly one relocation per particle even though
        // destinations are appended mid-pass.
        let (mesh, topo) = square_mesh(8);
        let mut pop =
            Population::new(&mesh, &topo, NormalizationPolicy::Identity).expect("population");
        let mut rows = Vec::new();
        for k in 0..64 {
            rows.push([
                0.05 + 0.8 * ((k * 7) % 64) as f64 / 64.0,
                0.05 + 0.8 * ((k * 11) % 64) as f64 / 64.0,
            ]);
        }
        let xs = Array2::from_shape_fn((rows.len(), 2), |(i, j)| rows[i][j]);
        let vs = Array2::zeros((1, 2));
        pop.add_particles(xs.view(), vs.view(), &[1.0], &[1.0])
            .expect("add");
        let before = pop.num_particles();

        for (_, p) in pop.particles_mut() {
            p.pos[0] += 0.12;
            p.pos[1] += 0.07;
        }
        let report = pop.update::<AbsorbingBody>(&mut []).expect("update");
        assert_eq!(pop.num_particles(), before - report.absorbed - report.escaped);
        // All positions stayed inside, so nothing may escape.
        assert_eq!(report.escaped, 0);
        assert_eq!(report.absorbed, 0);

        // Every particle ends up bucketed where it belongs.
        for cell in 0..pop.num_cells() {
            for p in pop.cell_particles(cell) {
                assert!(pop.locator().contains(cell, &p.pos));
            }
        }
    }

    #[test]
    fn test_boundary_escape_destroys_particle() {
        let (mesh, topo) = square_mesh(4);
        let mut pop =
            Population::new(&mesh, &topo, NormalizationPolicy::Identity).expect("population");
        let xs = array![[0.9, 0.5]];
        let vs = Array2::zeros((1, 2));
        pop.add_particles(xs.view(), vs.view(), &[1.0], &[1.0])
            .expect("add");
        for (_, p) in pop.particles_mut() {
            p.pos = [1.3, 0.5, 0.0];
        }
        let report = pop.update::<AbsorbingBody>(&mut []).expect("update");
        assert_eq!(report.escaped, 1);
        assert_eq!(pop.num_particles(), 0);
    }

    #[test]
    fn test_object_absorption_accumulates_charge() {
        let mesh =
            TriangleMesh::rectangle_with_cutout(8, 8, 1.0, 1.0, Some([0.25, 0.25, 0.75, 0.75]))
                .expect("mesh");
        let topo = MeshTopology::build(&mesh, mesh.facet_markers()).expect("topology");
        let mut pop =
            Population::new(&mesh, &topo, NormalizationPolicy::Identity).expect("population");
        let q = -2.5;
        let xs = array![[0.125, 0.5]];
        let vs = Array2::zeros((1, 2));
        pop.add_particles(xs.view(), vs.view(), &[q], &[1.0])
            .expect("add");

        // Step the particle into the embedded object.
        for (_, p) in pop.particles_mut() {
            p.pos = [0.5, 0.5, 0.0];
        }
        let mut bodies = [AbsorbingBody::new(OBJECT_MARKER)];
        let before = pop.num_particles();
        let report = pop.update(&mut bodies).expect("update");
        assert_eq!(report.absorbed, 1);
        assert_eq!(report.escaped, 0);
        assert_eq!(pop.num_particles(), before - 1);
        assert!((bodies[0].charge - q).abs() < 1e-15);
    }

    #[test]
    fn test_duplicate_sinks_rejected() {
        let (mesh, topo) = square_mesh(2);
        let mut pop =
            Population::new(&mesh, &topo, NormalizationPolicy::Identity).expect("population");
        let mut bodies = [AbsorbingBody::new(7), AbsorbingBody::new(7)];
        let err = pop.update(&mut bodies).unwrap_err();
        match err {
            PicError::ConfigError(msg) => assert!(msg.contains("two charge sinks")),
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_init_new_species_loads_population() {
        let (mesh, topo) = square_mesh(4);
        let mut pop =
            Population::new(&mesh, &topo, NormalizationPolicy::PlasmaParams).expect("population");
        let mut rng = StdRng::seed_from_u64(42);
        let h = pop
            .init_new_species(
                &SpeciesConfig::electron().with_num_total(200),
                &LoadOptions::default(),
                &mut rng,
            )
            .expect("species");
        assert_eq!(pop.num_particles(), 200);
        assert_eq!(pop.num_negatives(), 200);
        assert!((pop.plasma_density(h) - 200.0).abs() < 1e-12);

        // Cold start: all velocities are exactly zero.
        for (_, p) in pop.particles() {
            assert_eq!(p.vel, [0.0; 3]);
        }
    }

    #[test]
    fn test_init_new_species_empty_registers_only() {
        let (mesh, topo) = square_mesh(4);
        let mut pop =
            Population::new(&mesh, &topo, NormalizationPolicy::Identity).expect("population");
        let mut rng = StdRng::seed_from_u64(1);
        pop.init_new_species(
            &SpeciesConfig::electron(),
            &LoadOptions {
                empty: true,
                ..LoadOptions::default()
            },
            &mut rng,
        )
        .expect("species");
        assert_eq!(pop.num_particles(), 0);
        assert_eq!(pop.species().len(), 1);
    }

    #[test]
    fn test_from_config_loads_all_species() {
        let (mesh, topo) = square_mesh(4);
        let config = PopulationConfig {
            normalization: NormalizationPolicy::PlasmaParams,
            species: vec![
                SpeciesConfig::electron().with_num_total(50),
                SpeciesConfig::proton().with_num_total(50),
            ],
        };
        let mut rng = StdRng::seed_from_u64(3);
        let pop = Population::from_config(&mesh, &topo, &config, &mut rng).expect("population");
        assert_eq!(pop.num_particles(), 100);
        assert_eq!(pop.num_negatives(), 50);
        assert_eq!(pop.num_positives(), 50);
    }

    proptest! {
        /// Swap-removal in descending index order leaves exactly the
        /// complement multiset, for any subset of indices.
        #[test]
        fn swap_remove_descending_leaves_complement(
            n in 1usize..64,
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let list: Vec<ParticleId> = (0..n as u32).map(ParticleId).collect();
            let mut to_delete: Vec<usize> =
                (0..n).filter(|_| rng.gen_bool(0.4)).collect();
            to_delete.sort_unstable();

            let mut survivors = list.clone();
            remove_descending(&mut survivors, &to_delete);

            let mut expected: Vec<ParticleId> = list
                .iter()
                .enumerate()
                .filter(|(i, _)| !to_delete.contains(i))
                .map(|(_, &id)| id)
                .collect();
            let mut got = survivors;
            expected.sort_by_key(|id| id.0);
            got.sort_by_key(|id| id.0);
            prop_assert_eq!(got, expected);
        }
    }
}
