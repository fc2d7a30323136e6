#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use uuid::Uuid;

use polygon_validation::db::repository::FullRepository;
use polygon_validation::db::LocalRepository;
use polygon_validation::models::{
    PolygonAttributes, PolygonRecord, PolygonUuid, ProjectRecord, ProjectUuid, Ring, SiteRecord,
    SiteUuid,
};
use polygon_validation::services::ValidationService;
use polygon_validation::validators::CriteriaRegistry;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

// =========================================================
// Geometry
// =========================================================

/// Axis-aligned square with its lower-left corner at (`x`, `y`), in degrees.
pub fn square_at(x: f64, y: f64, size: f64) -> Ring {
    Ring::from_pairs(&[(x, y), (x + size, y), (x + size, y + size), (x, y + size)])
}

pub fn square(size: f64) -> Ring {
    square_at(0.0, 0.0, size)
}

/// Self-crossing quadrilateral.
pub fn bowtie() -> Ring {
    Ring::from_pairs(&[(0.0, 0.0), (0.01, 0.01), (0.01, 0.0), (0.0, 0.01)])
}

/// Square with a needle-thin protrusion at (0.05, 0.0051).
pub fn spiky() -> Ring {
    Ring::from_pairs(&[
        (0.0, 0.0),
        (0.01, 0.0),
        (0.01, 0.005),
        (0.05, 0.0051),
        (0.01, 0.0052),
        (0.01, 0.01),
        (0.0, 0.01),
    ])
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn complete_attributes() -> PolygonAttributes {
    PolygonAttributes {
        poly_name: Some("Block".into()),
        practice: Some("tree-planting".into()),
        target_sys: Some("agroforest".into()),
        distr: Some("full".into()),
        num_trees: Some(500),
        plantstart: Some(date(2021, 3, 1)),
    }
}

// =========================================================
// Seeded repository
// =========================================================

/// A project with one site, backed by a fresh local repository.
pub struct Fixture {
    pub repo: Arc<LocalRepository>,
    pub project: ProjectUuid,
    pub site: SiteUuid,
}

impl Fixture {
    /// Site and project goals of 1000 ha, site started 2020-01-01.
    pub fn new() -> Self {
        Self::with_goals(Some(1000.0), Some(1000.0))
    }

    pub fn with_goals(site_goal: Option<f64>, project_goal: Option<f64>) -> Self {
        let repo = Arc::new(LocalRepository::new());
        let project = ProjectUuid::new(Uuid::new_v4());
        let site = SiteUuid::new(Uuid::new_v4());
        repo.insert_project(ProjectRecord {
            uuid: project,
            name: "Green Belt".into(),
            area_goal_hectares: project_goal,
        });
        repo.insert_site(SiteRecord {
            uuid: site,
            name: "Riverside".into(),
            project_uuid: project,
            start_date: Some(date(2020, 1, 1)),
            area_goal_hectares: site_goal,
        });
        Self { repo, project, site }
    }

    /// Another site in the same project.
    pub fn add_site(&self, area_goal_hectares: Option<f64>) -> SiteUuid {
        let site = SiteUuid::new(Uuid::new_v4());
        self.repo.insert_site(SiteRecord {
            uuid: site,
            name: "Hillside".into(),
            project_uuid: self.project,
            start_date: None,
            area_goal_hectares,
        });
        site
    }

    /// Active, fully described polygon in the fixture's site.
    pub fn add_polygon(&self, boundary: Ring, calc_area: Option<f64>) -> PolygonUuid {
        self.add_polygon_with(|p| {
            p.boundary = boundary;
            p.calc_area = calc_area;
        })
    }

    pub fn add_polygon_with(&self, customize: impl FnOnce(&mut PolygonRecord)) -> PolygonUuid {
        let mut record = PolygonRecord {
            uuid: PolygonUuid::new(Uuid::new_v4()),
            site_uuid: self.site,
            attributes: complete_attributes(),
            calc_area: None,
            is_active: true,
            boundary: square(0.01),
        };
        customize(&mut record);
        let uuid = record.uuid;
        self.repo.insert_polygon(record);
        uuid
    }

    pub fn full(&self) -> Arc<dyn FullRepository> {
        self.repo.clone()
    }

    pub fn registry(&self) -> Arc<CriteriaRegistry> {
        Arc::new(CriteriaRegistry::with_default_validators(self.full()))
    }

    pub fn service(&self) -> ValidationService {
        ValidationService::new(self.full(), self.registry())
    }
}
