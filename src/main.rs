use std::{
    error::Error,
    fs,
    io::{self, BufRead},
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread,
};

use clap::{Parser, Subcommand};
use roosty_ring::{
    channel::AudioChannel,
    communication::{Command as Line, HostEvent},
    config::Config,
    desktop::{ConsoleAnnouncer, ConsoleSession, RodioAudio, SoftwareVolume},
    notify::ChannelNotifier,
    Admission, AlarmConfiguration, AlarmService, Channels, EditSettings,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// write the default config
    Init {
        #[clap(long, short)]
        force: bool,
    },
    /// ring the given alarm files, then take commands from stdin
    Run { alarms: Vec<PathBuf> },
}

fn main() -> Result<(), Box<dyn Error>> {
    // initilize the logger
    simple_file_logger::init_logger!("roosty_ring").expect("couldn't initialize logger");

    let args = Args::parse();
    match args.command {
        Some(Command::Init { force }) => init(force),
        Some(Command::Run { alarms }) => run(&alarms),
        None => run(&[]),
    }
}

fn init(force: bool) -> Result<(), Box<dyn Error>> {
    if force || !Config::is_config_present() {
        Config::new().save(Config::config_path())?;
        fs::create_dir_all(Config::sounds_path())?;
        println!("wrote {}", Config::config_path().display());
    } else {
        println!(
            "{} already exists, use --force to overwrite it",
            Config::config_path().display()
        );
    }
    Ok(())
}

fn run(alarms: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let config = Config::load(Config::config_path())?;
    // the stream has to outlive every sink
    let stream = rodio::OutputStreamBuilder::open_default_stream()?;

    let volume = SoftwareVolume::new(config.initial_volume, config.enforce_interval());
    let audio: Arc<dyn AudioChannel> =
        Arc::new(RodioAudio::new(stream.mixer().clone(), volume.clone()));
    let channels = Channels::new()
        .with_audio(Arc::clone(&audio))
        .with_volume(Arc::new(volume.clone()))
        .with_voice(Arc::new(ConsoleAnnouncer::new(
            "voice announcement",
            None,
            config.duck_hold(),
        )))
        .with_time(Arc::new(ConsoleAnnouncer::new(
            "time announcement",
            Some(audio),
            config.duck_hold(),
        )));

    let (tx, rx) = mpsc::channel();
    let service = AlarmService::new(
        channels,
        Arc::new(ChannelNotifier::new(tx)),
        Arc::new(ConsoleSession::new()),
        config.ring_options(),
    );
    let events = thread::spawn(move || {
        for event in rx {
            match event {
                HostEvent::AlarmRang(id) => println!("alarm {id} is ringing"),
                HostEvent::AlarmStopped(id) => println!("alarm {id} stopped"),
            }
        }
    });

    for alarm in alarms {
        fire(&service, &config, alarm);
    }

    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match Line::parse(&line) {
            Ok(Line::Fire(path)) => fire(&service, &config, &path),
            Ok(Line::Edit(path)) => edit(&service, &config, &path),
            Ok(Line::Stop(id)) => {
                for error in service.on_stop_requested(id).into_errors() {
                    eprintln!("stopping alarm {id}: {error}");
                }
            }
            Ok(Line::Volume(level)) => volume.set_level(level),
            Ok(Line::List) => {
                let ringing = service.snapshot();
                if ringing.is_empty() {
                    println!("nothing is ringing");
                }
                for id in ringing {
                    let channels = service
                        .entry(id)
                        .map(|entry| entry.active_channels)
                        .unwrap_or_default();
                    println!("alarm {id}: {channels:?}");
                }
            }
            Ok(Line::Quit) => break,
            Err(e) => eprintln!("{e}"),
        }
    }

    if let Some(report) = service.on_process_destroy() {
        for error in report.into_errors() {
            eprintln!("shutting down: {error}");
        }
    }
    drop(service);
    events.join().map_err(|_| "event printer panicked")?;
    Ok(())
}

fn fire(service: &AlarmService, config: &Config, path: &Path) {
    let outcome = fs::read_to_string(path)
        .map_err(roosty_ring::Error::from)
        .and_then(|settings| AlarmConfiguration::from_toml(&settings))
        .and_then(|mut alarm| {
            alarm.audio.path = config.sound(&alarm.audio.path);
            service.on_fire(&alarm).map(|admission| (alarm.id, admission))
        });
    match outcome {
        Ok((id, Admission::Admitted(report))) => {
            for error in report.into_errors() {
                eprintln!("alarm {id} rings without {error}");
            }
        }
        Ok((id, Admission::Rejected(reason))) => println!("alarm {id} not rung: {reason:?}"),
        Err(e) => eprintln!("{}: {e}", path.display()),
    }
}

fn edit(service: &AlarmService, config: &Config, path: &Path) {
    let outcome = fs::read_to_string(path)
        .map_err(roosty_ring::Error::from)
        .and_then(|settings| EditSettings::from_toml(&settings))
        .and_then(|mut edit| {
            if let Some(audio) = edit.audio.as_mut() {
                audio.path = config.sound(&audio.path);
            }
            service.on_edit(&edit)
        });
    match outcome {
        Ok(report) => {
            for error in report.into_errors() {
                eprintln!("{}: {error}", path.display());
            }
        }
        Err(e) => eprintln!("{}: {e}", path.display()),
    }
}
