//! Headless navigation demo
//!
//! Runs one episode on a layout file (or the built-in demo layout) and logs
//! progress to the console.

use std::env;

use fuzzy_nav::prelude::*;

/// Ticks between progress lines
const REPORT_INTERVAL: u32 = 200;

/// Logs progress every few hundred ticks and every notable event
struct ConsoleReporter {
    interval: u32,
}

impl Observer for ConsoleReporter {
    fn on_start(&mut self, run: &RunState) {
        let pose = run.pose();
        let goal = run.goal();
        log::info!(
            "Start ({:.2}, {:.2}) heading {:.0}°, goal ({:.2}, {:.2}), distance {:.2}m",
            pose.position.x,
            pose.position.y,
            pose.heading.to_degrees(),
            goal.x,
            goal.y,
            pose.distance_to(goal)
        );
    }

    fn on_step(&mut self, result: &StepResult, events: &[NavEvent]) {
        for event in events {
            match event {
                NavEvent::EscapeTriggered { tick, escape } => {
                    log::info!("Tick {tick}: escape {escape:?}");
                }
                NavEvent::MotionBlocked { tick, position } => {
                    log::debug!("Tick {tick}: blocked at ({:.3}, {:.3})", position.x, position.y);
                }
                _ => {}
            }
        }

        if result.tick % self.interval == 0 {
            let r = result.reading;
            log::info!(
                "Tick {} | Pos ({:.2}, {:.2}) | Goal {:.2}m | F/L/R {:.0}/{:.0}/{:.0}cm | Turn {:+.1}° ({:?}) | Stuck {}",
                result.tick,
                result.pose.position.x,
                result.pose.position.y,
                result.goal_distance,
                r.front,
                r.left,
                r.right,
                result.correction,
                result.source,
                result.stuck_counter
            );
        }
    }

    fn on_finish(&mut self, summary: &RunSummary) {
        log::info!(
            "{:?} after {} ticks, {:.2}m from goal",
            summary.terminal,
            summary.ticks,
            summary.goal_distance
        );
        log::info!("{}", summary.stats.format_stats());
    }
}

struct Args {
    layout: Option<String>,
    config: Option<String>,
    preset: Preset,
    max_ticks: Option<u32>,
    tolerance: Option<f32>,
}

enum Command {
    Run(Args),
    Help,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut layout = None;
    let mut config = None;
    let mut preset = Preset::default();
    let mut max_ticks = None;
    let mut tolerance = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--preset" | "-p" => {
                i += 1;
                let name = args.get(i).ok_or("Missing preset name")?;
                preset = Preset::from_name(name).ok_or_else(|| format!("Unknown preset: {name}"))?;
            }
            "--config" | "-c" => {
                i += 1;
                config = Some(args.get(i).ok_or("Missing config path")?.clone());
            }
            "--max-ticks" => {
                i += 1;
                let value = args.get(i).ok_or("Missing tick count")?;
                max_ticks = Some(value.parse().map_err(|_| format!("Invalid tick count: {value}"))?);
            }
            "--tolerance" => {
                i += 1;
                let value = args.get(i).ok_or("Missing goal tolerance")?;
                tolerance = Some(value.parse().map_err(|_| format!("Invalid goal tolerance: {value}"))?);
            }
            "--help" | "-h" => return Ok(Command::Help),
            arg if !arg.starts_with('-') => {
                if layout.is_some() {
                    return Err("Multiple layout files specified".to_string());
                }
                layout = Some(arg.to_string());
            }
            _ => {
                return Err(format!("Unknown argument: {}", args[i]));
            }
        }
        i += 1;
    }

    Ok(Command::Run(Args {
        layout,
        config,
        preset,
        max_ticks,
        tolerance,
    }))
}

fn print_usage(program: &str) {
    eprintln!(
        "Usage: {program} [layout.(ron|json)] [--preset reactive|smoothed] [--config nav.(ron|json)] [--max-ticks N] [--tolerance M]"
    );
}

fn run(args: Args) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let layout = match &args.layout {
        Some(path) => ArenaLayout::load(path)?,
        None => ArenaLayout::demo(),
    };
    let config = match &args.config {
        Some(path) if path.ends_with(".json") => NavConfig::load_json(path)?,
        Some(path) => NavConfig::load_ron(path)?,
        None => NavConfig::preset(args.preset),
    };
    let config = match args.max_ticks {
        Some(ticks) => config.with_max_ticks(ticks),
        None => config,
    };
    let config = match args.tolerance {
        Some(tolerance) => config.with_goal_tolerance(tolerance),
        None => config,
    };

    log::info!(
        "Layout '{}' with {} obstacles, preset {}",
        layout.name,
        layout.obstacle_count(),
        args.preset.name()
    );

    let run = layout.start_run(config)?;
    let mut simulation = Simulation::new(
        run,
        ConsoleReporter {
            interval: REPORT_INTERVAL,
        },
    );
    Ok(simulation.run())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map_or("fuzzy-nav", String::as_str);
    let parsed = match parse_args(&args) {
        Ok(Command::Run(parsed)) => parsed,
        Ok(Command::Help) => {
            print_usage(program);
            return;
        }
        Err(e) => {
            eprintln!("Error: {e}");
            print_usage(program);
            std::process::exit(1);
        }
    };

    match run(parsed) {
        Ok(summary) if summary.succeeded() => {}
        Ok(_) => std::process::exit(2),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("fuzzy-nav")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_help_is_not_an_error() {
        assert!(matches!(parse_args(&argv(&["--help"])), Ok(Command::Help)));
        assert!(matches!(parse_args(&argv(&["arena.ron", "-h"])), Ok(Command::Help)));
    }

    #[test]
    fn test_parse_run_options() {
        let Ok(Command::Run(args)) = parse_args(&argv(&[
            "arena.ron",
            "--preset",
            "smoothed",
            "--max-ticks",
            "300",
            "--tolerance",
            "0.1",
        ])) else {
            panic!("expected run arguments");
        };
        assert_eq!(args.layout.as_deref(), Some("arena.ron"));
        assert_eq!(args.preset, Preset::Smoothed);
        assert_eq!(args.max_ticks, Some(300));
        assert_eq!(args.tolerance, Some(0.1));
        assert!(args.config.is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&argv(&["--bogus"])).is_err());
        assert!(parse_args(&argv(&["--preset"])).is_err());
        assert!(parse_args(&argv(&["--max-ticks", "many"])).is_err());
        assert!(parse_args(&argv(&["a.ron", "b.ron"])).is_err());
        // Empty argv still parses
        assert!(matches!(parse_args(&[]), Ok(Command::Run(_))));
    }
}
