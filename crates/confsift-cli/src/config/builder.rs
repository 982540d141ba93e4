use super::defaults::DefaultsConfig;
use super::file::{
    FileAlignConfig, FileConfig, FileEarlyBreakConfig, FilePassesConfig, FilePrefilterConfig,
    FileThreshold,
};
use super::models::AppConfig;
use crate::cli::ScanArgs;
use crate::error::{CliError, Result};
use confsift::core::align::cost::CostMetric;
use confsift::core::align::engine::{AlignOptions, CenterMode};
use confsift::core::align::template::TemplateStrategy;
use confsift::engine::config::{
    Channel, ChannelMask, ChannelMultipliers, EarlyBreak, LooseMode, PrefilterConfig,
    ScanConfigBuilder, Threshold,
};
use std::str::FromStr;

pub fn build_config(args: &ScanArgs, threads: Option<usize>) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let threshold = match (&args.threshold, file_config.rmsd_threshold.take()) {
        (Some(cli), _) => parse_threshold(cli)?,
        (None, Some(FileThreshold::Value(value))) => parse_threshold(&value.to_string())?,
        (None, Some(FileThreshold::Keyword(word))) => parse_threshold(&word)?,
        (None, None) => parse_threshold(&defaults.rmsd_threshold)?,
    };

    let threads = threads.or(file_config.threads).unwrap_or(defaults.threads);

    let align = merge_align(args, file_config.align.take().unwrap_or_default(), &defaults)?;
    let prefilter = merge_prefilter(file_config.prefilter.take().unwrap_or_default(), &defaults)?;
    let early_break = merge_early_break(file_config.early_break.take().unwrap_or_default());
    let passes = file_config.passes.take().unwrap_or_default();

    let core_config = ScanConfigBuilder::new()
        .threshold(threshold)
        .align(align)
        .prefilter(prefilter)
        .early_break(early_break)
        .threads(threads)
        .max_energy(args.max_energy.or(file_config.max_energy))
        .max_rank(args.max_rank.or(file_config.max_rank))
        .skip_initial(flag(args.skip_initial, &passes, |p| p.skip_initial))
        .skip_reorder(flag(args.skip_reorder, &passes, |p| p.skip_reorder))
        .skip_reuse(flag(args.skip_reuse, &passes, |p| p.skip_reuse))
        .skip_new_rules(flag(args.skip_new_rules, &passes, |p| p.skip_new_rules))
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig {
        input_path: args.input.clone(),
        output_base: args.output.clone(),
        prior_path: args.prior.clone(),
        restart_paths: args.restart.clone(),
        stop_file: args.stop_file.clone(),
        core_config,
    })
}

/// Alignment options for the `align` subcommand, which has no config file.
pub fn align_options(
    strategy: Option<&str>,
    cost_metric: Option<&str>,
    reorder: bool,
    center_of_mass: bool,
    max_cycles: Option<usize>,
    max_hbond_difference: Option<usize>,
) -> Result<AlignOptions> {
    let defaults = DefaultsConfig::default();
    let mut options = AlignOptions {
        reorder,
        strategy: parse_value("strategy", strategy.unwrap_or(&defaults.strategy))?,
        cost_metric: parse_value::<CostMetric>(
            "cost-metric",
            cost_metric.unwrap_or(&defaults.cost_metric),
        )?,
        max_hbond_difference,
        ..AlignOptions::default()
    };
    if center_of_mass {
        options.center = CenterMode::CenterOfMass;
    }
    if let Some(cycles) = max_cycles {
        if cycles == 0 {
            return Err(CliError::Argument("max-cycles must be at least 1".to_string()));
        }
        options.max_cycles = cycles;
    }
    Ok(options)
}

fn merge_align(
    args: &ScanArgs,
    file: FileAlignConfig,
    defaults: &DefaultsConfig,
) -> Result<AlignOptions> {
    let strategy: TemplateStrategy = parse_value(
        "align.strategy",
        args.strategy
            .as_deref()
            .or(file.strategy.as_deref())
            .unwrap_or(&defaults.strategy),
    )?;
    let cost_metric: CostMetric = parse_value(
        "align.cost-metric",
        args.cost_metric
            .as_deref()
            .or(file.cost_metric.as_deref())
            .unwrap_or(&defaults.cost_metric),
    )?;
    let center = match file.center.as_deref() {
        None => CenterMode::default(),
        Some(value) => parse_center(value)?,
    };

    let base = AlignOptions::default();
    Ok(AlignOptions {
        reorder: file.reorder.unwrap_or(base.reorder),
        strategy,
        cost_metric,
        center,
        max_cycles: file.max_cycles.unwrap_or(base.max_cycles),
        shelf_capacity: file.shelf_capacity.unwrap_or(base.shelf_capacity),
        max_hbond_difference: args.max_hbond_difference.or(file.max_hbond_difference),
        reference_fragment: file.reference_fragment.or_else(|| file.fragment.clone()),
        target_fragment: file.target_fragment.or(file.fragment),
        // The scan divides its own budget between comparisons.
        threads: 1,
    })
}

fn merge_prefilter(file: FilePrefilterConfig, defaults: &DefaultsConfig) -> Result<PrefilterConfig> {
    let loose_mask = mask("prefilter.loose-mask", file.loose_mask.unwrap_or(defaults.loose_mask))?;
    let tight_mask = mask("prefilter.tight-mask", file.tight_mask.unwrap_or(defaults.tight_mask))?;
    let loose_mode: LooseMode = parse_value(
        "prefilter.loose-mode",
        file.loose_mode.as_deref().unwrap_or(&defaults.loose_mode),
    )?;

    let loose_base = file
        .loose_multipliers
        .clone()
        .unwrap_or_else(|| defaults.loose_multipliers.clone());
    let loose_lists = [
        (Channel::Energy, file.loose_energy_multipliers.clone()),
        (Channel::Rotational, file.loose_rotational_multipliers.clone()),
        (Channel::Barcode, file.loose_barcode_multipliers.clone()),
    ];
    let mut loose_multipliers = vec![ChannelMultipliers::uniform(0.0); loose_base.len()];
    for (channel, list) in loose_lists {
        let list = list.unwrap_or_else(|| loose_base.clone());
        if list.len() != loose_base.len() {
            return Err(CliError::Config(format!(
                "Loose multiplier lists differ in length: {:?} has {} entries, expected {}",
                channel,
                list.len(),
                loose_base.len()
            )));
        }
        for (pass, value) in loose_multipliers.iter_mut().zip(list) {
            pass.set(channel, value);
        }
    }

    let tight_base = file.tight_multiplier.unwrap_or(defaults.tight_multiplier);
    let tight_multipliers = ChannelMultipliers {
        energy: file.tight_energy_multiplier.unwrap_or(tight_base),
        rotational: file.tight_rotational_multiplier.unwrap_or(tight_base),
        barcode: file.tight_barcode_multiplier.unwrap_or(tight_base),
    };

    Ok(PrefilterConfig {
        loose_mask,
        tight_mask,
        loose_multipliers,
        tight_multipliers,
        loose_mode,
        ignore_rotation: file.ignore_rotation.unwrap_or(false),
        ignore_barcode: file.ignore_barcode.unwrap_or(false),
    })
}

fn merge_early_break(file: FileEarlyBreakConfig) -> EarlyBreak {
    let base = EarlyBreak::default();
    EarlyBreak {
        reuse: file.reuse.unwrap_or(base.reuse),
        reorder: file.reorder.unwrap_or(base.reorder),
    }
}

fn flag(cli: bool, passes: &FilePassesConfig, get: impl Fn(&FilePassesConfig) -> Option<bool>) -> bool {
    cli || get(passes).unwrap_or(false)
}

fn mask(name: &str, bits: u8) -> Result<ChannelMask> {
    ChannelMask::from_bits(bits)
        .ok_or_else(|| CliError::Config(format!("Invalid value for {name}: {bits} is not in 0..=7")))
}

fn parse_threshold(value: &str) -> Result<Threshold> {
    Threshold::from_str(value).map_err(|e| CliError::Config(format!("Invalid RMSD threshold: {e}")))
}

fn parse_center(value: &str) -> Result<CenterMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "centroid" => Ok(CenterMode::Centroid),
        "center-of-mass" | "com" => Ok(CenterMode::CenterOfMass),
        other => Err(CliError::Config(format!(
            "Invalid value for align.center: '{other}'. Expected 'centroid' or 'center-of-mass'."
        ))),
    }
}

fn parse_value<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| CliError::Config(format!("Invalid value for {name}: {e}")))
}

fn parse_set<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {kind} value for {key}: {value}")))
}

fn parse_list(key: &str, value: &str) -> Result<Vec<f64>> {
    value
        .split(',')
        .map(|m| parse_set::<f64>(key, m.trim(), "float"))
        .collect()
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value_str) = kv_pair.split_once('=').ok_or_else(|| {
            CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            ))
        })?;
        let key = key.trim();
        let value_str = value_str.trim();

        match key {
            "rmsd-threshold" => {
                config.rmsd_threshold = Some(match value_str.parse::<f64>() {
                    Ok(value) => FileThreshold::Value(value),
                    Err(_) => FileThreshold::Keyword(value_str.to_string()),
                });
            }
            "threads" => config.threads = Some(parse_set(key, value_str, "integer")?),
            "max-energy" => config.max_energy = Some(parse_set(key, value_str, "float")?),
            "max-rank" => config.max_rank = Some(parse_set(key, value_str, "integer")?),
            "align.reorder" => {
                config.align.get_or_insert_with(Default::default).reorder =
                    Some(parse_set(key, value_str, "boolean")?);
            }
            "align.strategy" => {
                config.align.get_or_insert_with(Default::default).strategy =
                    Some(value_str.to_string());
            }
            "align.cost-metric" => {
                config.align.get_or_insert_with(Default::default).cost_metric =
                    Some(value_str.to_string());
            }
            "align.center" => {
                config.align.get_or_insert_with(Default::default).center =
                    Some(value_str.to_string());
            }
            "align.max-cycles" => {
                config.align.get_or_insert_with(Default::default).max_cycles =
                    Some(parse_set(key, value_str, "integer")?);
            }
            "align.shelf-capacity" => {
                config.align.get_or_insert_with(Default::default).shelf_capacity =
                    Some(parse_set(key, value_str, "integer")?);
            }
            "align.max-hbond-difference" => {
                config
                    .align
                    .get_or_insert_with(Default::default)
                    .max_hbond_difference = Some(parse_set(key, value_str, "integer")?);
            }
            "prefilter.loose-mask" => {
                config.prefilter.get_or_insert_with(Default::default).loose_mask =
                    Some(parse_set(key, value_str, "integer")?);
            }
            "prefilter.tight-mask" => {
                config.prefilter.get_or_insert_with(Default::default).tight_mask =
                    Some(parse_set(key, value_str, "integer")?);
            }
            "prefilter.tight-multiplier"
            | "prefilter.tight-energy-multiplier"
            | "prefilter.tight-rotational-multiplier"
            | "prefilter.tight-barcode-multiplier" => {
                let value = Some(parse_set(key, value_str, "float")?);
                let prefilter = config.prefilter.get_or_insert_with(Default::default);
                match key {
                    "prefilter.tight-energy-multiplier" => prefilter.tight_energy_multiplier = value,
                    "prefilter.tight-rotational-multiplier" => {
                        prefilter.tight_rotational_multiplier = value
                    }
                    "prefilter.tight-barcode-multiplier" => prefilter.tight_barcode_multiplier = value,
                    _ => prefilter.tight_multiplier = value,
                }
            }
            "prefilter.loose-multipliers"
            | "prefilter.loose-energy-multipliers"
            | "prefilter.loose-rotational-multipliers"
            | "prefilter.loose-barcode-multipliers" => {
                let value = Some(parse_list(key, value_str)?);
                let prefilter = config.prefilter.get_or_insert_with(Default::default);
                match key {
                    "prefilter.loose-energy-multipliers" => prefilter.loose_energy_multipliers = value,
                    "prefilter.loose-rotational-multipliers" => {
                        prefilter.loose_rotational_multipliers = value
                    }
                    "prefilter.loose-barcode-multipliers" => {
                        prefilter.loose_barcode_multipliers = value
                    }
                    _ => prefilter.loose_multipliers = value,
                }
            }
            "prefilter.loose-mode" => {
                config.prefilter.get_or_insert_with(Default::default).loose_mode =
                    Some(value_str.to_string());
            }
            "prefilter.ignore-rotation" => {
                config
                    .prefilter
                    .get_or_insert_with(Default::default)
                    .ignore_rotation = Some(parse_set(key, value_str, "boolean")?);
            }
            "prefilter.ignore-barcode" => {
                config
                    .prefilter
                    .get_or_insert_with(Default::default)
                    .ignore_barcode = Some(parse_set(key, value_str, "boolean")?);
            }
            "early-break.reuse" => {
                config.early_break.get_or_insert_with(Default::default).reuse =
                    Some(parse_set(key, value_str, "boolean")?);
            }
            "early-break.reorder" => {
                config.early_break.get_or_insert_with(Default::default).reorder =
                    Some(parse_set(key, value_str, "boolean")?);
            }
            "passes.skip-initial" => {
                config.passes.get_or_insert_with(Default::default).skip_initial =
                    Some(parse_set(key, value_str, "boolean")?);
            }
            "passes.skip-reorder" => {
                config.passes.get_or_insert_with(Default::default).skip_reorder =
                    Some(parse_set(key, value_str, "boolean")?);
            }
            "passes.skip-reuse" => {
                config.passes.get_or_insert_with(Default::default).skip_reuse =
                    Some(parse_set(key, value_str, "boolean")?);
            }
            "passes.skip-new-rules" => {
                config.passes.get_or_insert_with(Default::default).skip_new_rules =
                    Some(parse_set(key, value_str, "boolean")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unknown configuration key for --set: {}",
                    key
                )));
            }
        }
    }
    Ok(config)
}
