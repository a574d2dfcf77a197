//! Template and stage validation command

use anyhow::{bail, Context, Result};
use std::path::Path;
use talon_stage::Stage;
use talon_template::TemplateBank;

pub fn run(stage_path: &str, templates: &str) -> Result<()> {
    let bank = if Path::new(templates).is_dir() {
        TemplateBank::load_from_directory(templates)
            .with_context(|| format!("failed to load templates from {templates}"))?
    } else {
        let mut bank = TemplateBank::new();
        bank.load_file(templates)
            .with_context(|| format!("failed to load templates from {templates}"))?;
        bank
    };
    println!("Templates: {} loaded", bank.len());
    bank.validate().context("template cross-references")?;
    println!("Template cross-references: ok");

    let stage = Stage::load_file(stage_path)
        .with_context(|| format!("failed to load stage {stage_path}"))?;
    println!(
        "Stage '{}': {} actor(s), {} trigger(s)",
        stage.name(),
        stage.actors().len(),
        stage.triggers().len()
    );

    let mut problems = Vec::new();
    for actor in stage.actors() {
        if !bank.contains(&actor.template) {
            problems.push(format!(
                "actor at ({}, {}) references missing template '{}'",
                actor.position.x, actor.position.y, actor.template
            ));
        }
    }
    for trigger in stage.triggers() {
        if let Some(linked) = &trigger.boss_link {
            if !bank.contains(linked) {
                problems.push(format!(
                    "trigger '{}' is linked to missing boss template '{}'",
                    trigger.name, linked
                ));
            }
        }
    }

    if problems.is_empty() {
        println!("Stage cross-references: ok");
        Ok(())
    } else {
        for problem in &problems {
            println!("  {problem}");
        }
        bail!("{} problem(s) found", problems.len());
    }
}
