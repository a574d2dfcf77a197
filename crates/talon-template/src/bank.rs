//! Template bank for loading and resolving templates

use crate::template::{SpawnTemplate, TemplateFile, TemplateKind};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use talon_core::{Result, TalonError};

/// Registry that holds all loaded spawn templates.
///
/// Templates are shared as `Arc`s: pooled instances hold a clone of the
/// `Arc` they were spawned from, so the bank is only consulted at spawn
/// and checkpoint-load time.
#[derive(Debug, Default)]
pub struct TemplateBank {
    templates: HashMap<String, Arc<SpawnTemplate>>,
}

impl TemplateBank {
    /// Create a new empty bank
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.toml` template file in a directory
    pub fn load_from_directory<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut bank = Self::new();
        let path = path.as_ref();

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();
            if file_path.extension().map(|e| e == "toml").unwrap_or(false) {
                bank.load_file(&file_path)?;
            }
        }

        Ok(bank)
    }

    /// Load templates from a single TOML file into this bank
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let content = fs::read_to_string(path)?;
        self.load_str(&content)
    }

    /// Load templates from a TOML string into this bank
    pub fn load_str(&mut self, content: &str) -> Result<()> {
        let file: TemplateFile = toml::from_str(content)?;
        for (name, def) in file.template {
            let template = def.into_template(&name)?;
            self.templates.insert(name, Arc::new(template));
        }
        Ok(())
    }

    /// Register an already-built template (tests and tooling)
    pub fn insert(&mut self, template: SpawnTemplate) -> Arc<SpawnTemplate> {
        let arc = Arc::new(template);
        self.templates.insert(arc.name.clone(), Arc::clone(&arc));
        arc
    }

    /// Get a template by name
    pub fn get(&self, name: &str) -> Option<Arc<SpawnTemplate>> {
        self.templates.get(name).cloned()
    }

    /// Get a template by name, or fail with `TemplateNotFound`
    pub fn resolve(&self, name: &str) -> Result<Arc<SpawnTemplate>> {
        self.get(name)
            .ok_or_else(|| TalonError::TemplateNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// All template names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Check that every template-to-template reference resolves.
    ///
    /// Run after loading; the simulation assumes referenced names exist
    /// (spawn failures at tick time would otherwise surface config
    /// mistakes mid-stage).
    pub fn validate(&self) -> Result<()> {
        for template in self.templates.values() {
            for reference in template_references(template) {
                if !self.contains(reference) {
                    return Err(TalonError::ValidationError(format!(
                        "template '{}' references missing template '{}'",
                        template.name, reference
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Every template name a template points at
fn template_references(template: &SpawnTemplate) -> Vec<&str> {
    let mut refs = Vec::new();
    if let Some(name) = &template.interval_spawn {
        refs.push(name.as_str());
    }
    if let Some(name) = &template.despawn_spawn {
        refs.push(name.as_str());
    }
    match &template.kind {
        TemplateKind::Entity(entity) => {
            if let Some(name) = &entity.destroy_spawn {
                refs.push(name.as_str());
            }
            for phase in &entity.phases {
                for option in &phase.options {
                    refs.push(option.projectile.as_str());
                }
            }
        }
        TemplateKind::Spawner(spawner) => {
            if let Some(name) = &spawner.spawn {
                refs.push(name.as_str());
            }
        }
        TemplateKind::Pickup(pickup) => {
            if let crate::template::PickupEffect::Weapon { weapon } = &pickup.effect {
                refs.push(weapon.projectile.as_str());
            }
        }
        TemplateKind::Effect(_) => {}
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
        [template.shot]
        collision_layer = 4
        collision_mask = 2

        [template.shot.entity]
        speed = 120.0
        ram_damage = 1

        [template.drone]
        interval = 0.8
        interval_spawn = "shot"
        despawn_spawn = "puff"

        [template.drone.entity]
        speed = 30.0
        hp = 2

        [template.puff]
        [template.puff.effect]
        lifetime = 0.4

        [template.wave.spawner]
        trigger = "on_seen"
        spawn = "drone"
        points = [[0, 0], [10, 0]]
        duration = 1.0
    "#;

    #[test]
    fn test_load_and_get() {
        let mut bank = TemplateBank::new();
        bank.load_str(FIXTURE).unwrap();
        assert_eq!(bank.len(), 4);
        assert_eq!(bank.names(), vec!["drone", "puff", "shot", "wave"]);

        let drone = bank.get("drone").unwrap();
        assert_eq!(drone.interval_spawn.as_deref(), Some("shot"));
        assert!(bank.get("missing").is_none());
    }

    #[test]
    fn test_resolve_missing_is_error() {
        let bank = TemplateBank::new();
        assert!(matches!(
            bank.resolve("ghost"),
            Err(TalonError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_validate_accepts_fixture() {
        let mut bank = TemplateBank::new();
        bank.load_str(FIXTURE).unwrap();
        bank.validate().unwrap();
    }

    #[test]
    fn test_validate_flags_dangling_reference() {
        let mut bank = TemplateBank::new();
        bank.load_str(
            r#"
            [template.lone.spawner]
            trigger = "on_placed"
            spawn = "nonexistent"
            "#,
        )
        .unwrap();
        assert!(matches!(
            bank.validate(),
            Err(TalonError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_checks_phase_projectiles() {
        let mut bank = TemplateBank::new();
        bank.load_str(
            r#"
            [template.boss.entity]
            hp = 10
            [[template.boss.entity.phases]]
            hp_mark = 10
            options = [{ projectile = "missing_shot" }]
            "#,
        )
        .unwrap();
        assert!(bank.validate().is_err());
    }

    #[test]
    fn test_shared_arc_identity() {
        let mut bank = TemplateBank::new();
        bank.load_str(FIXTURE).unwrap();
        let a = bank.get("drone").unwrap();
        let b = bank.get("drone").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
