//! Greetcast CLI: voice-cloned greeting speech and video.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use greetcast_core::assembler::assemble;
use greetcast_core::audio::io::read_audio_file;
use greetcast_core::cache::ReferenceCache;
use greetcast_core::catalog::Catalog;
use greetcast_core::config::{GreetConfig, home_dir};
use greetcast_core::mixer::{MixParams, mix};
use greetcast_core::text::RuleSegmenter;
use greetcast_core::tts::get_synthesizer;
use greetcast_core::video::{FfmpegCodec, VideoSegment};
use greetcast_core::GreetingService;

// ─── Top-level CLI ───────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "greetcast",
    about = "Personalised greeting speech and video from a short voice sample",
    version,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// JSON config file (default: <home>/config.json if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the catalog (default: $GREETCAST_HOME or ~/.local/share/greetcast)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    /// Disable the voice reference cache
    #[arg(long, global = true, default_value_t = false)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Speak text in a cloned voice (WAV output)
    Speak(SpeakArgs),
    /// Lay a speech track over a video
    Mix(MixArgs),
    /// Join intro, main and outro clips with a closing fade
    Assemble(AssembleArgs),
    /// Render a full greeting from a stored template
    Greet(GreetArgs),
    /// Manage stored voice references
    #[command(subcommand)]
    Reference(ReferenceCommand),
    /// Manage stored videos
    #[command(subcommand)]
    Video(VideoCommand),
    /// Manage greeting templates
    #[command(subcommand)]
    Template(TemplateCommand),
    /// Write or print the settings file
    #[command(subcommand)]
    Config(ConfigCommand),
}

// ─── Shared arguments ────────────────────────────────────────────

#[derive(Args, Debug)]
struct TextArgs {
    /// Greeting text
    #[arg(long, conflicts_with = "text_file")]
    text: Option<String>,

    /// Read the greeting text from a file
    #[arg(long)]
    text_file: Option<PathBuf>,

    /// Language code passed to the TTS model
    #[arg(long)]
    language: Option<String>,

    /// Skip speech enhancement
    #[arg(long, default_value_t = false)]
    no_enhance: bool,

    /// Silence between sentences (ms)
    #[arg(long)]
    sentence_pause: Option<u64>,

    /// Synthesize sentence chunks in parallel
    #[arg(long, default_value_t = false)]
    parallel: bool,
}

impl TextArgs {
    fn read_text(&self) -> Result<String> {
        match (&self.text, &self.text_file) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display())),
            (None, None) => bail!("Either --text or --text-file is required"),
        }
    }

    fn apply(&self, config: &mut GreetConfig) {
        if let Some(language) = &self.language {
            config.synthesis.language = language.clone();
        }
        if self.no_enhance {
            config.synthesis.enhance = false;
        }
        if let Some(pause) = self.sentence_pause {
            config.synthesis.sentence_pause_ms = pause;
        }
        if self.parallel {
            config.synthesis.parallel_chunks = true;
        }
    }
}

#[derive(Args, Debug)]
struct TimingArgs {
    /// Closing fade-out length in seconds (0 to disable)
    #[arg(long)]
    fade: Option<f64>,

    /// Video kept after the speech ends, in seconds
    #[arg(long)]
    padding: Option<f64>,

    /// Speech gain in dB
    #[arg(long, allow_hyphen_values = true)]
    speech_gain: Option<f64>,
}

impl TimingArgs {
    fn apply(&self, config: &mut GreetConfig) {
        if let Some(fade) = self.fade {
            config.mix.fade_duration_s = fade;
        }
        if let Some(padding) = self.padding {
            config.mix.post_speech_padding_s = padding;
        }
        if let Some(gain) = self.speech_gain {
            config.mix.speech_gain_db = gain;
        }
    }
}

// ─── Subcommand arguments ────────────────────────────────────────

#[derive(Args, Debug)]
struct SpeakArgs {
    #[command(flatten)]
    text: TextArgs,

    /// Voice sample to clone (any audio format)
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Stored voice reference id (instead of --reference)
    #[arg(long, conflicts_with = "reference")]
    reference_id: Option<String>,

    /// Output WAV file
    #[arg(short, long, default_value = "greeting.wav")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct MixArgs {
    /// Source video
    #[arg(long)]
    video: PathBuf,

    /// Speech track (audio file)
    #[arg(long)]
    speech: PathBuf,

    #[command(flatten)]
    timing: TimingArgs,

    /// Output video file
    #[arg(short, long, default_value = "mixed.mp4")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct AssembleArgs {
    /// Opening clip
    #[arg(long)]
    intro: Option<PathBuf>,

    /// Main clip
    #[arg(long)]
    main: PathBuf,

    /// Closing clip
    #[arg(long)]
    outro: Option<PathBuf>,

    /// Closing fade-out length in seconds (0 to disable)
    #[arg(long)]
    fade: Option<f64>,

    /// Output video file
    #[arg(short, long, default_value = "greeting.mp4")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct GreetArgs {
    /// Template id
    #[arg(long)]
    template: String,

    #[command(flatten)]
    text: TextArgs,

    #[command(flatten)]
    timing: TimingArgs,

    /// Output video file
    #[arg(short, long, default_value = "greeting.mp4")]
    output: PathBuf,
}

#[derive(Subcommand, Debug)]
enum ReferenceCommand {
    /// Import a voice sample (converted to 22.05 kHz mono WAV)
    Add {
        /// Audio file to import
        file: PathBuf,
        /// Stored file name (".wav" is appended if missing)
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Rename a stored voice sample
    Rename { id: String, name: String },
    /// List stored voice samples
    List,
    /// Delete a voice sample and the templates that use it
    Remove { id: String },
}

#[derive(Subcommand, Debug)]
enum VideoCommand {
    /// Import a video file
    Add {
        file: PathBuf,
        #[arg(long)]
        description: Option<String>,
    },
    /// List stored videos
    List,
    /// Delete a video (templates using it as main video are deleted too)
    Remove { id: String },
}

#[derive(Subcommand, Debug)]
enum TemplateCommand {
    /// Create a template
    Add {
        /// Main video id
        #[arg(long)]
        video: String,
        /// Voice reference id
        #[arg(long)]
        reference: String,
        /// Intro video id
        #[arg(long)]
        intro: Option<String>,
        /// Outro video id
        #[arg(long)]
        outro: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List templates
    List,
    /// Show one template as JSON
    Show { id: String },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default settings to the config file
    Init {
        /// Overwrite an existing file
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Print the effective settings as JSON
    Show,
}

// ─── Main ────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.global.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Command::Speak(args) => run_speak(&cli.global, args),
        Command::Mix(args) => run_mix(&cli.global, args),
        Command::Assemble(args) => run_assemble(&cli.global, args),
        Command::Greet(args) => run_greet(&cli.global, args),
        Command::Reference(cmd) => run_reference(&cli.global, cmd),
        Command::Video(cmd) => run_video(&cli.global, cmd),
        Command::Template(cmd) => run_template(&cli.global, cmd),
        Command::Config(cmd) => run_config(&cli.global, cmd),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

// ─── Helpers ─────────────────────────────────────────────────────

fn home(global: &GlobalArgs) -> PathBuf {
    global.home.clone().unwrap_or_else(home_dir)
}

fn config_path(global: &GlobalArgs) -> PathBuf {
    global.config.clone().unwrap_or_else(|| home(global).join("config.json"))
}

/// Explicit --config, else <home>/config.json, else defaults.
fn load_config(global: &GlobalArgs) -> Result<GreetConfig> {
    let path = config_path(global);
    if global.config.is_none() && !path.exists() {
        return Ok(GreetConfig::default());
    }
    log::debug!("Loading config from {}", path.display());
    GreetConfig::load(&path).with_context(|| format!("Invalid config file {}", path.display()))
}

fn open_catalog(global: &GlobalArgs) -> Result<Catalog> {
    let root = home(global);
    Catalog::open(&root).with_context(|| format!("Failed to open catalog at {}", root.display()))
}

fn reference_cache(global: &GlobalArgs) -> Option<ReferenceCache> {
    (!global.no_cache).then(ReferenceCache::default_location)
}

fn codec(config: &GreetConfig) -> Result<FfmpegCodec> {
    FfmpegCodec::from_config(&config.encoder, &config.retry).context("Video encoder unavailable")
}

fn validate_inputs(paths: &[&Path]) -> Result<()> {
    for p in paths {
        if !p.exists() {
            bail!("File not found: {}", p.display());
        }
    }
    Ok(())
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Write `bytes` to `path` via a temp file in the same directory, so a
/// failed run never leaves a partial output behind.
fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Output: {}", path.display());
    Ok(())
}

// ─── Runners ─────────────────────────────────────────────────────

fn run_speak(global: &GlobalArgs, args: SpeakArgs) -> Result<()> {
    let mut config = load_config(global)?;
    args.text.apply(&mut config);
    let text = args.text.read_text()?;

    let reference_path = match (&args.reference, &args.reference_id) {
        (Some(path), _) => path.clone(),
        (None, Some(id)) => open_catalog(global)?.reference_path(id)?,
        (None, None) => bail!("Either --reference or --reference-id is required"),
    };
    validate_inputs(&[&reference_path])?;
    let reference_bytes = std::fs::read(&reference_path)?;

    let synthesizer = get_synthesizer(&config.tts)?;
    let mut service = GreetingService::new(&synthesizer, &RuleSegmenter, config);
    if let Some(cache) = reference_cache(global) {
        service = service.with_cache(cache);
    }

    let wav = service.generate_speech(
        &text,
        &reference_bytes,
        extension_of(&reference_path).as_deref(),
    )?;
    write_output(&args.output, &wav)
}

fn run_mix(global: &GlobalArgs, args: MixArgs) -> Result<()> {
    validate_inputs(&[&args.video, &args.speech])?;
    let mut config = load_config(global)?;
    args.timing.apply(&mut config);

    let codec = codec(&config)?;
    let video = VideoSegment::open(&codec, &args.video)
        .with_context(|| format!("Failed to read video {}", args.video.display()))?;
    let speech = read_audio_file(&args.speech)
        .with_context(|| format!("Failed to read speech {}", args.speech.display()))?;

    let mixed = mix(&codec, video, &speech, &MixParams::from_config(&config.mix))?;
    write_output(&args.output, &mixed.into_bytes()?)
}

fn run_assemble(global: &GlobalArgs, args: AssembleArgs) -> Result<()> {
    let mut paths: Vec<&Path> = vec![&args.main];
    paths.extend(args.intro.as_deref());
    paths.extend(args.outro.as_deref());
    validate_inputs(&paths)?;

    let mut config = load_config(global)?;
    if let Some(fade) = args.fade {
        config.mix.fade_duration_s = fade;
    }
    let codec = codec(&config)?;

    let open = |path: &Path| {
        VideoSegment::open(&codec, path).with_context(|| format!("Failed to read video {}", path.display()))
    };
    let intro = args.intro.as_deref().map(open).transpose()?;
    let main = open(&args.main)?;
    let outro = args.outro.as_deref().map(open).transpose()?;

    let fade_ms = MixParams::from_config(&config.mix).fade_duration_ms;
    let out = assemble(&codec, intro, main, outro, fade_ms)?;
    write_output(&args.output, &out.into_bytes()?)
}

fn run_greet(global: &GlobalArgs, args: GreetArgs) -> Result<()> {
    let mut config = load_config(global)?;
    args.text.apply(&mut config);
    args.timing.apply(&mut config);
    let text = args.text.read_text()?;

    let catalog = open_catalog(global)?;
    let codec = codec(&config)?;
    let synthesizer = get_synthesizer(&config.tts)?;
    let mut service = GreetingService::new(&synthesizer, &RuleSegmenter, config);
    if let Some(cache) = reference_cache(global) {
        service = service.with_cache(cache);
    }

    let video = service
        .generate_from_template(&catalog, &codec, &args.template, &text)
        .with_context(|| format!("Greeting for template {} failed", args.template))?;
    write_output(&args.output, &video)
}

fn run_reference(global: &GlobalArgs, cmd: ReferenceCommand) -> Result<()> {
    let mut catalog = open_catalog(global)?;
    match cmd {
        ReferenceCommand::Add { file, name, description } => {
            validate_inputs(&[&file])?;
            let name = match name {
                Some(name) => name,
                None => file
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .context("Cannot derive a name from the file; pass --name")?,
            };
            let bytes = std::fs::read(&file)?;
            let reference = catalog.add_reference(
                &name,
                &bytes,
                extension_of(&file).as_deref(),
                description.as_deref(),
            )?;
            println!("{}\t{}", reference.id, reference.file_name);
        }
        ReferenceCommand::Rename { id, name } => {
            let reference = catalog.rename_reference(&id, &name)?;
            println!("{}\t{}", reference.id, reference.file_name);
        }
        ReferenceCommand::List => {
            for r in catalog.list_references() {
                println!("{}\t{}\t{}", r.id, r.file_name, r.description.as_deref().unwrap_or(""));
            }
        }
        ReferenceCommand::Remove { id } => {
            let dropped = catalog.delete_reference(&id)?;
            println!("Removed reference {} ({} template(s) deleted)", id, dropped.len());
        }
    }
    Ok(())
}

fn run_video(global: &GlobalArgs, cmd: VideoCommand) -> Result<()> {
    let mut catalog = open_catalog(global)?;
    match cmd {
        VideoCommand::Add { file, description } => {
            validate_inputs(&[&file])?;
            let extension = extension_of(&file).unwrap_or_else(|| "mp4".to_string());
            let bytes = std::fs::read(&file)?;
            let video = catalog.add_video(&bytes, &extension, description.as_deref())?;
            println!("{}\t{}", video.id, video.file_name);
        }
        VideoCommand::List => {
            for v in catalog.list_videos() {
                println!("{}\t{}\t{}", v.id, v.file_name, v.description.as_deref().unwrap_or(""));
            }
        }
        VideoCommand::Remove { id } => {
            let dropped = catalog.delete_video(&id)?;
            println!("Removed video {} ({} template(s) deleted)", id, dropped.len());
        }
    }
    Ok(())
}

fn run_template(global: &GlobalArgs, cmd: TemplateCommand) -> Result<()> {
    let mut catalog = open_catalog(global)?;
    match cmd {
        TemplateCommand::Add { video, reference, intro, outro, description } => {
            let template = catalog.add_template(
                &video,
                &reference,
                intro.as_deref(),
                outro.as_deref(),
                description.as_deref(),
            )?;
            println!("{}", template.id);
        }
        TemplateCommand::List => {
            for t in catalog.list_templates() {
                println!(
                    "{}\tintro={}\tvideo={}\toutro={}\treference={}\t{}",
                    t.id,
                    t.intro_id.as_deref().unwrap_or("-"),
                    t.video_id,
                    t.outro_id.as_deref().unwrap_or("-"),
                    t.reference_id,
                    t.description.as_deref().unwrap_or("")
                );
            }
        }
        TemplateCommand::Show { id } => {
            let template = catalog.get_template(&id)?;
            println!("{}", serde_json::to_string_pretty(&template)?);
        }
    }
    Ok(())
}

fn run_config(global: &GlobalArgs, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Init { force } => {
            let path = config_path(global);
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            GreetConfig::default()
                .save(&path)
                .with_context(|| format!("Could not write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
        }
        ConfigCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&load_config(global)?)?);
        }
    }
    Ok(())
}
