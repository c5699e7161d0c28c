//! Markdown report: screening summary, per-fold tables, strategy comparison,
//! cluster annotations and a generated interpretation.

use std::fmt::{self, Write};

use leafn_core::cv::{compare, CvRun};
use leafn_core::dataset::{ExclusionReason, Screening};
use leafn_core::summary::ClusterSummaries;
use leafn_core::AnalysisConfig;

use crate::render::cluster_color;

/// Figures and summaries of one clustered partition.
pub struct ClusterSection {
    pub strategy: &'static str,
    pub map: String,
    pub density: String,
    pub summaries: ClusterSummaries,
}

pub fn render(
    cfg: &AnalysisConfig,
    screening: &Screening,
    runs: &[CvRun],
    observation_map: &str,
    clusters: &[ClusterSection],
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_report(&mut out, cfg, screening, runs, observation_map, clusters)?;
    Ok(out)
}

fn write_report(
    out: &mut String,
    cfg: &AnalysisConfig,
    screening: &Screening,
    runs: &[CvRun],
    observation_map: &str,
    clusters: &[ClusterSection],
) -> fmt::Result {
    writeln!(out, "# Leaf nitrogen: random vs. spatial vs. environmental cross-validation")?;
    writeln!(out)?;
    write_design(out, cfg)?;
    write_screening(out, screening, observation_map)?;
    for run in runs {
        write_folds(out, run)?;
    }
    write_comparison(out, runs)?;
    for section in clusters {
        write_clusters(out, section)?;
    }
    write_interpretation(out, runs, clusters)
}

// ── Sections ─────────────────────────────────────────────────────────────────

fn write_design(out: &mut String, cfg: &AnalysisConfig) -> fmt::Result {
    let predictors: Vec<&str> = cfg.predictors.iter().map(|p| p.name()).collect();
    writeln!(out, "## Design")?;
    writeln!(out)?;
    writeln!(
        out,
        "Random forest regression of leaf N on {}. {} trees, mtry {}, minimum leaf size {}, model seed {}.",
        predictors.join(", "),
        cfg.forest.n_trees,
        cfg.forest.resolved_mtry(cfg.predictors.len()),
        cfg.forest.min_leaf,
        cfg.forest.seed
    )?;
    writeln!(
        out,
        "Each strategy splits the data into {} folds (partition seed {}).",
        cfg.folds, cfg.partition_seed
    )?;
    writeln!(out)
}

fn write_screening(out: &mut String, screening: &Screening, observation_map: &str) -> fmt::Result {
    let outside = screening.count_excluded(ExclusionReason::OutsideTopSpecies);
    let missing = screening.count_excluded(ExclusionReason::MissingValue);
    writeln!(out, "## Data")?;
    writeln!(out)?;
    writeln!(out, "| | rows |")?;
    writeln!(out, "|---|---:|")?;
    writeln!(out, "| raw records | {} |", screening.n_raw)?;
    writeln!(out, "| outside the {} most frequent species | {} |", screening.top_species.len(), outside)?;
    writeln!(out, "| missing a value | {} |", missing)?;
    writeln!(out, "| **analysed** | **{}** |", screening.table.len())?;
    writeln!(out)?;
    writeln!(out, "![Observations: analysed (green) and excluded (grey)]({observation_map})")?;
    writeln!(out)?;
    let species: Vec<String> = screening
        .top_species
        .iter()
        .map(|(name, n)| format!("{name} ({n})"))
        .collect();
    writeln!(out, "Species retained, by raw record count: {}.", species.join(", "))?;
    writeln!(out)
}

fn write_folds(out: &mut String, run: &CvRun) -> fmt::Result {
    writeln!(out, "## {} CV", title(run.strategy))?;
    writeln!(out)?;
    writeln!(out, "| fold | n train | n test | R² | r² | RMSE |")?;
    writeln!(out, "|---:|---:|---:|---:|---:|---:|")?;
    for f in &run.folds {
        writeln!(
            out,
            "| {} | {} | {} | {:.3} | {:.3} | {:.3} |",
            f.fold + 1,
            f.n_train,
            f.n_test,
            f.metrics.rsq,
            f.metrics.squared_r,
            f.metrics.rmse
        )?;
    }
    let m = run.mean();
    writeln!(
        out,
        "| **mean** | | | **{:.3}** | **{:.3}** | **{:.3}** |",
        m.rsq, m.squared_r, m.rmse
    )?;
    writeln!(out)?;
    writeln!(
        out,
        "R² is the coefficient of determination on the held-out rows; r² is the squared correlation of predicted and observed leaf N."
    )?;
    writeln!(out)
}

fn write_comparison(out: &mut String, runs: &[CvRun]) -> fmt::Result {
    writeln!(out, "## Comparison")?;
    writeln!(out)?;
    writeln!(out, "| strategy | mean R² | mean r² | mean RMSE | R² sd | R² range |")?;
    writeln!(out, "|---|---:|---:|---:|---:|---:|")?;
    for row in compare(runs) {
        writeln!(
            out,
            "| {} | {:.3} | {:.3} | {:.3} | {:.3} | {:.3} |",
            row.strategy,
            row.mean.rsq,
            row.mean.squared_r,
            row.mean.rmse,
            row.rsq_sd,
            row.rsq_spread
        )?;
    }
    writeln!(out)
}

fn write_clusters(out: &mut String, section: &ClusterSection) -> fmt::Result {
    writeln!(out, "## {} clusters", title(section.strategy))?;
    writeln!(out)?;
    writeln!(out, "![{} clusters]({})", section.strategy, section.map)?;
    writeln!(out)?;
    writeln!(out, "![Leaf N density per {} cluster]({})", section.strategy, section.density)?;
    writeln!(out)?;
    if let (Some(lo), Some(hi)) = (section.summaries.grid.first(), section.summaries.grid.last()) {
        writeln!(out, "Density x-axis spans leaf N {lo:.2} to {hi:.2}.")?;
        writeln!(out)?;
    }
    writeln!(out, "| cluster | colour | n | mean leaf N | species |")?;
    writeln!(out, "|---:|---|---:|---:|---:|")?;
    for c in &section.summaries.clusters {
        let [r, g, b] = cluster_color(c.cluster);
        writeln!(
            out,
            "| {} | #{r:02x}{g:02x}{b:02x} | {} | {:.3} | {} |",
            c.cluster + 1,
            c.n,
            c.mean_leaf_n,
            c.n_species
        )?;
    }
    writeln!(out)
}

// ── Interpretation ───────────────────────────────────────────────────────────

fn write_interpretation(out: &mut String, runs: &[CvRun], clusters: &[ClusterSection]) -> fmt::Result {
    writeln!(out, "## Interpretation")?;
    writeln!(out)?;
    for line in interpretation(runs, clusters) {
        writeln!(out, "{line}")?;
        writeln!(out)?;
    }
    Ok(())
}

/// Descriptive statements only; no significance testing.
pub fn interpretation(runs: &[CvRun], clusters: &[ClusterSection]) -> Vec<String> {
    let mut lines = Vec::new();
    let random = runs.iter().find(|r| r.strategy == "random");

    let mut ranked: Vec<&CvRun> = runs.iter().collect();
    ranked.sort_by(|a, b| b.mean().rsq.total_cmp(&a.mean().rsq));
    if let (Some(best), Some(worst)) = (ranked.first(), ranked.last()) {
        if ranked.len() > 1 {
            lines.push(format!(
                "{} CV gives the highest mean R² ({:.3}) and {} CV the lowest ({:.3}).",
                title(best.strategy),
                best.mean().rsq,
                title(worst.strategy),
                worst.mean().rsq
            ));
        }
    }

    if let Some(random) = random {
        let base = random.mean();
        for run in runs.iter().filter(|r| r.strategy != "random") {
            let m = run.mean();
            let change = if m.rsq < base.rsq { "drops" } else { "rises" };
            lines.push(format!(
                "Relative to random folds, mean R² {change} by {:.3} and mean RMSE changes by {:+.3} under {} CV.",
                (base.rsq - m.rsq).abs(),
                m.rmse - base.rmse,
                run.strategy
            ));
        }
    }

    for run in runs {
        let negative = run.folds.iter().filter(|f| f.metrics.rsq < 0.0).count();
        if negative > 0 {
            lines.push(format!(
                "{} of {} {} folds have negative R²: the forest predicts those held-out rows worse than their own mean.",
                negative,
                run.folds.len(),
                run.strategy
            ));
        }
    }

    if let Some(widest) = runs.iter().max_by(|a, b| a.rsq_spread().total_cmp(&b.rsq_spread())) {
        if runs.len() > 1 && widest.folds.len() > 1 {
            lines.push(format!(
                "Fold-to-fold R² varies most under {} CV (range {:.3}).",
                widest.strategy,
                widest.rsq_spread()
            ));
        }
    }

    for section in clusters {
        let populated: Vec<_> = section.summaries.clusters.iter().filter(|c| c.n > 0).collect();
        let hi = populated.iter().max_by(|a, b| a.mean_leaf_n.total_cmp(&b.mean_leaf_n));
        let lo = populated.iter().min_by(|a, b| a.mean_leaf_n.total_cmp(&b.mean_leaf_n));
        let small = populated.iter().min_by_key(|c| c.n);
        if let (Some(hi), Some(lo), Some(small)) = (hi, lo, small) {
            lines.push(format!(
                "Among {} clusters, mean leaf N ranges from {:.3} (cluster {}) to {:.3} (cluster {}); \
                 the smallest cluster {} holds {} rows of {} species.",
                section.strategy,
                lo.mean_leaf_n,
                lo.cluster + 1,
                hi.mean_leaf_n,
                hi.cluster + 1,
                small.cluster + 1,
                small.n,
                small.n_species
            ));
        }
    }

    lines
}

fn title(strategy: &str) -> String {
    let mut chars = strategy.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leafn_core::cv::FoldOutcome;
    use leafn_core::dataset::Excluded;
    use leafn_core::partition::Partition;
    use leafn_core::summary::ClusterSummary;
    use leafn_core::{FoldMetrics, Observation, ObservationTable};

    fn run(strategy: &'static str, rsq: &[f64]) -> CvRun {
        CvRun {
            strategy,
            partition: Partition::new(rsq.len(), (0..rsq.len()).collect()).unwrap(),
            folds: rsq
                .iter()
                .enumerate()
                .map(|(i, &r)| FoldOutcome {
                    fold: i,
                    n_train: 40,
                    n_test: 10,
                    metrics: FoldMetrics { rsq: r, squared_r: 0.8, rmse: 0.2 + i as f64 * 0.01 },
                })
                .collect(),
        }
    }

    fn screening() -> Screening {
        let obs = Observation {
            leaf_n: 2.1,
            longitude: 10.0,
            latitude: 50.0,
            elevation: 300.0,
            temperature: 8.0,
            precipitation: 800.0,
            n_deposition: 12.0,
            irradiance: 120.0,
            species: "Fagus sylvatica".to_string(),
        };
        Screening {
            table: ObservationTable::new(vec![obs]),
            excluded: vec![
                Excluded { reason: ExclusionReason::MissingValue, coordinates: Some((0.0, 0.0)) },
                Excluded { reason: ExclusionReason::OutsideTopSpecies, coordinates: None },
                Excluded { reason: ExclusionReason::OutsideTopSpecies, coordinates: None },
            ],
            top_species: vec![("Fagus sylvatica".to_string(), 2)],
            n_raw: 4,
        }
    }

    fn section() -> ClusterSection {
        let cluster = |cluster, n, mean_leaf_n, n_species| ClusterSummary {
            cluster,
            n,
            mean_leaf_n,
            n_species,
            density: vec![0.0, 0.5, 0.0],
        };
        ClusterSection {
            strategy: "spatial",
            map: "map_spatial_clusters.png".to_string(),
            density: "density_spatial.png".to_string(),
            summaries: ClusterSummaries {
                grid: vec![1.0, 2.0, 3.0],
                clusters: vec![cluster(0, 30, 1.8, 4), cluster(1, 5, 2.6, 1)],
            },
        }
    }

    #[test]
    fn report_has_every_section_and_one_based_folds() {
        let runs = vec![run("random", &[0.6, 0.5, 0.7]), run("spatial", &[0.2, -0.1, 0.3])];
        let text = render(
            &AnalysisConfig::default(),
            &screening(),
            &runs,
            "map_observations.png",
            &[section()],
        )
        .unwrap();
        for heading in ["## Data", "## Random CV", "## Spatial CV", "## Comparison", "## Spatial clusters", "## Interpretation"] {
            assert!(text.contains(heading), "missing {heading}");
        }
        assert!(text.contains("| raw records | 4 |"));
        assert!(text.contains("| missing a value | 1 |"));
        assert!(text.contains("| 1 | 40 | 10 | 0.600 | 0.800 | 0.200 |"));
        assert!(text.contains("| 3 | 40 | 10 | 0.700 | 0.800 | 0.220 |"));
        assert!(text.contains("| **mean** | | | **0.600** | **0.800** |"));
        assert!(text.contains("| random | 0.600 | 0.800 |"));
        assert!(text.contains("![Observations: analysed (green) and excluded (grey)](map_observations.png)"));
        assert!(text.contains("| 2 | #377eb8 | 5 | 2.600 | 1 |"));
    }

    #[test]
    fn interpretation_describes_drop_and_negative_folds() {
        let runs = vec![run("random", &[0.6, 0.5, 0.7]), run("spatial", &[0.2, -0.1, 0.2])];
        let lines = interpretation(&runs, &[section()]);
        assert!(lines[0].starts_with("Random CV gives the highest mean R² (0.600)"));
        assert!(lines.iter().any(|l| l.contains("mean R² drops by 0.500") && l.contains("spatial")));
        assert!(lines.iter().any(|l| l.starts_with("1 of 3 spatial folds have negative R²")));
        assert!(lines.iter().any(|l| l.contains("cluster 2 holds 5 rows of 1 species")));
    }

    #[test]
    fn title_capitalizes() {
        assert_eq!(title("environmental"), "Environmental");
        assert_eq!(title(""), "");
    }
}
