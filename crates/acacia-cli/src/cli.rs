//! Argument surface and option validation.

use std::path::PathBuf;

use clap::Parser;

use acacia_compiler::{Config, Encoding};
use acacia_core::{validate_name, validate_path, McVersion};

#[derive(Parser)]
#[command(name = "acacia", bin_name = "acacia")]
#[command(about = "Compile Acacia sources to Minecraft Bedrock command-script files")]
pub struct Cli {
    /// Source file to compile
    #[arg(value_name = "FILE")]
    pub source: PathBuf,

    /// Output directory
    #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
    pub out: PathBuf,

    /// Target Minecraft version `X.Y.Z`
    #[arg(long, value_name = "VERSION", default_value = "1.19.50")]
    pub mc_version: String,

    /// Target Education Edition
    #[arg(long)]
    pub education_edition: bool,

    /// Scoreboard objective backing allocated variables
    #[arg(long, value_name = "NAME", default_value = "acacia")]
    pub scoreboard: String,

    /// Folder under the output root that receives function files
    #[arg(long, value_name = "PATH", default_value = "")]
    pub function_folder: String,

    /// Name of the entry file
    #[arg(long, value_name = "NAME", default_value = "main")]
    pub main_file: String,

    /// Name of the initialization file
    #[arg(long, value_name = "NAME", default_value = "init")]
    pub init_file: String,

    /// Folder for compiler-generated helper files
    #[arg(long, value_name = "NAME", default_value = "internal")]
    pub internal_folder: String,

    /// Prefix for allocated entity tags
    #[arg(long, value_name = "NAME", default_value = "acacia")]
    pub entity_tag: String,

    /// Emit comment lines describing source statements
    #[arg(long)]
    pub debug_comments: bool,

    /// Disable conditional-call inlining
    #[arg(long)]
    pub no_optimize: bool,

    /// Delete previous contents of the function folder before writing
    #[arg(long)]
    pub override_old: bool,

    /// Source encoding (utf-8 or latin-1)
    #[arg(long, value_name = "ENCODING", default_value = "utf-8")]
    pub encoding: String,

    /// Print extra detail about the compilation
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Largest guarded body, in lines, inlined into an execute chain
    #[arg(long, value_name = "LINES", default_value_t = 20)]
    pub max_inline: u32,
}

/// A rejected option, reported as `Acacia: error: option <name>: <reason>`.
#[derive(Debug)]
pub struct OptionError {
    pub option: &'static str,
    pub reason: String,
}

impl Cli {
    /// Validate the identifier-shaped options and assemble the compiler
    /// configuration.
    pub fn into_parts(self) -> Result<(PathBuf, PathBuf, Config), OptionError> {
        let fail = |option: &'static str, reason: String| OptionError { option, reason };

        validate_name(&self.scoreboard)
            .map_err(|e| fail("scoreboard", e.to_string()))?;
        validate_name(&self.entity_tag).map_err(|e| fail("entity-tag", e.to_string()))?;
        if !self.function_folder.is_empty() {
            validate_path(&self.function_folder)
                .map_err(|e| fail("function-folder", e.to_string()))?;
        }
        validate_path(&self.main_file).map_err(|e| fail("main-file", e.to_string()))?;
        validate_path(&self.init_file).map_err(|e| fail("init-file", e.to_string()))?;
        validate_path(&self.internal_folder)
            .map_err(|e| fail("internal-folder", e.to_string()))?;

        let mc_version: McVersion = self
            .mc_version
            .parse()
            .map_err(|e: acacia_core::VersionParseError| fail("mc-version", e.to_string()))?;

        let encoding = match self.encoding.as_str() {
            "utf-8" | "utf8" => Encoding::Utf8,
            "latin-1" | "latin1" => Encoding::Latin1,
            other => {
                return Err(fail("encoding", format!("unsupported encoding {other:?}")));
            }
        };

        let config = Config {
            mc_version,
            education_edition: self.education_edition,
            scoreboard: self.scoreboard,
            function_folder: self.function_folder,
            main_file: self.main_file,
            init_file: self.init_file,
            internal_folder: self.internal_folder,
            entity_tag_prefix: self.entity_tag,
            debug_comments: self.debug_comments,
            optimize: !self.no_optimize,
            override_old: self.override_old,
            encoding,
            verbose: self.verbose,
            max_inline: self.max_inline,
        };
        Ok((self.source, self.out, config))
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["acacia"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).expect("arguments should parse")
    }

    #[test]
    fn defaults_validate() {
        let (source, out, config) = parse(&["game.aca"]).into_parts().unwrap();
        assert_eq!(source, PathBuf::from("game.aca"));
        assert_eq!(out, PathBuf::from("."));
        assert_eq!(config.scoreboard, "acacia");
        assert_eq!(config.max_inline, 20);
        assert!(config.optimize);
    }

    #[test]
    fn scoreboard_must_not_start_with_a_digit() {
        let err = parse(&["game.aca", "--scoreboard", "9lives"])
            .into_parts()
            .unwrap_err();
        assert_eq!(err.option, "scoreboard");
        assert_eq!(err.reason, "must not start with a digit");
    }

    #[test]
    fn entity_tag_rejects_invalid_characters() {
        let err = parse(&["game.aca", "--entity-tag", "my tag"])
            .into_parts()
            .unwrap_err();
        assert_eq!(err.option, "entity-tag");
        assert_eq!(err.reason, "invalid character ' '");
    }

    #[test]
    fn function_folder_may_be_empty_but_not_invalid() {
        assert!(parse(&["game.aca", "--function-folder", ""])
            .into_parts()
            .is_ok());
        let err = parse(&["game.aca", "--function-folder", "Bad/Upper"])
            .into_parts()
            .unwrap_err();
        assert_eq!(err.option, "function-folder");
    }

    #[test]
    fn version_must_be_a_triple() {
        let err = parse(&["game.aca", "--mc-version", "1.19"])
            .into_parts()
            .unwrap_err();
        assert_eq!(err.option, "mc-version");
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let err = parse(&["game.aca", "--encoding", "shift-jis"])
            .into_parts()
            .unwrap_err();
        assert_eq!(err.option, "encoding");
    }

    #[test]
    fn no_optimize_clears_the_flag() {
        let (_, _, config) = parse(&["game.aca", "--no-optimize"]).into_parts().unwrap();
        assert!(!config.optimize);
    }
}
