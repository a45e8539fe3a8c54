use clap::Parser;
use gre::config::EngineConfig;
use std::path::PathBuf;

/// User-specified command line parameters
#[derive(Debug, Parser)]
#[clap(name = "Gre", about)]
pub struct Args {
    #[clap(long, short = 'c')]
    /// Path to a TOML configuration file.
    pub config: Option<PathBuf>,

    #[clap(long, short = 'f')]
    /// Amount of frames to run before exiting. Overrides the config file, 0 runs until a close
    /// trigger fires.
    pub frames: Option<usize>,

    #[clap(long, short = 'v')]
    /// Enables trace logging.
    pub verbose: bool,

    #[clap(long = "technique", short = 't')]
    /// Technique file to load, can be repeated. Added to the config file's list.
    pub techniques: Vec<PathBuf>,
}

impl Args {
    /// Overrides the config with whatever was passed on the command line.
    pub fn apply(&self, config: &mut EngineConfig) {
        if let Some(frames) = self.frames {
            config.max_frames = frames;
        }
        config.verbose |= self.verbose;
        config.techniques.extend(self.techniques.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_override_config() {
        let args = Args::parse_from([
            "gre",
            "--frames",
            "3",
            "-t",
            "a.technique",
            "--technique",
            "b.technique",
        ]);
        let mut config = EngineConfig {
            max_frames: 100,
            techniques: vec![PathBuf::from("base.technique")],
            ..Default::default()
        };
        args.apply(&mut config);

        assert_eq!(config.max_frames, 3);
        assert!(!config.verbose);
        assert_eq!(
            config.techniques,
            vec![
                PathBuf::from("base.technique"),
                PathBuf::from("a.technique"),
                PathBuf::from("b.technique"),
            ]
        );
    }
}
