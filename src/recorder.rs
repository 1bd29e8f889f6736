use std::process::{Child, Command, Stdio};

use tracing::{debug, info, warn};

use crate::argv::translate_extras;
use crate::session::{ConnectionRequest, PlayRequest};

/// Narrow capability for firing off a detached child process.
pub(crate) trait Spawn {
    fn spawn_detached(&mut self, argv: &[String]);
}

/// Spawns recorders via the OS and forgets about them, apart from reaping
/// already-finished children before the next spawn.
#[derive(Default)]
pub(crate) struct ProcessSpawner {
    children: Vec<Child>,
}

impl ProcessSpawner {
    fn reap_finished(&mut self) {
        self.children
            .retain_mut(|child| !matches!(child.try_wait(), Ok(Some(_))));
    }
}

impl Spawn for ProcessSpawner {
    fn spawn_detached(&mut self, argv: &[String]) {
        self.reap_finished();

        let Some((program, args)) = argv.split_first() else {
            return;
        };
        match Command::new(program).args(args).stdin(Stdio::null()).spawn() {
            Ok(child) => {
                debug!(pid = child.id(), "recorder spawned");
                self.children.push(child);
            }
            // Best effort, recording is not guaranteed.
            Err(error) => warn!(?error, %program, "failed to spawn recorder"),
        }
    }
}

pub(crate) struct RecorderLauncher<S: Spawn> {
    program: String,
    spawner: S,
}

impl RecorderLauncher<ProcessSpawner> {
    pub fn new(program: String) -> Self {
        Self::with_spawner(program, ProcessSpawner::default())
    }
}

impl<S: Spawn> RecorderLauncher<S> {
    pub fn with_spawner(program: String, spawner: S) -> Self {
        Self { program, spawner }
    }

    pub fn launch(&mut self, request: &ConnectionRequest, play: &PlayRequest) {
        let command = build_recorder_command(&self.program, request, play);
        info!(command = %command.join(" "), "launching recorder");
        self.spawner.spawn_detached(&command);
    }
}

/// Reconstructs the client request as a recorder invocation:
/// `program -r tcUrl [-a app] [-f flashVer] [-W swfUrl] [-p pageUrl]
///  [-C value]* -y playpath -o outfile`.
pub(crate) fn build_recorder_command(
    program: &str,
    request: &ConnectionRequest,
    play: &PlayRequest,
) -> Vec<String> {
    let mut command = vec![
        program.to_string(),
        "-r".to_string(),
        request.tc_url.clone(),
    ];
    for (flag, value) in [
        ("-a", &request.app),
        ("-f", &request.flash_ver),
        ("-W", &request.swf_url),
        ("-p", &request.page_url),
    ] {
        if !value.is_empty() {
            command.push(flag.to_string());
            command.push(value.clone());
        }
    }
    command.extend(translate_extras(&request.extras));
    command.push("-y".to_string());
    command.push(play.playpath.clone());
    command.push("-o".to_string());
    command.push(play.output_filename.clone());
    command
}

/// Derives the recorder's output file from the playpath: the query string and
/// any path components are stripped, one leading dot is dropped, `:` becomes
/// `_` and `.flv` is appended unless the name already ends in a dotted
/// three-letter extension.
pub(crate) fn derive_output_filename(playpath: &str) -> String {
    let stem = &playpath[..playpath.find('?').unwrap_or(playpath.len())];
    let stem = match stem.rfind('/') {
        Some(slash) => &stem[slash + 1..],
        None => stem,
    };
    let stem = stem.strip_prefix('.').unwrap_or(stem);

    let mut file = stem.replace(':', "_");
    let has_extension = file.len() >= 4 && file.as_bytes()[file.len() - 4] == b'.';
    if !has_extension {
        file.push_str(".flv");
    }
    file
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf0::{AmfObject, AmfProperty, AmfValue};

    #[test]
    fn strips_query_and_path_components() {
        assert_eq!(derive_output_filename("foo/bar.flv?x=1"), "bar.flv");
    }

    #[test]
    fn strips_leading_dot_and_appends_extension() {
        assert_eq!(derive_output_filename("./clip"), "clip.flv");
    }

    #[test]
    fn replaces_colons() {
        assert_eq!(derive_output_filename("a:b"), "a_b.flv");
    }

    #[test]
    fn keeps_existing_extension() {
        assert_eq!(derive_output_filename("video.mp4"), "video.mp4");
    }

    #[test]
    fn empty_playpath_still_produces_a_name() {
        assert_eq!(derive_output_filename(""), ".flv");
    }

    #[test]
    fn command_keeps_fixed_argument_order() {
        let request = ConnectionRequest {
            app: "vod".to_string(),
            tc_url: "rtmp://host/vod".to_string(),
            page_url: "http://host/page".to_string(),
            extras: AmfObject {
                properties: vec![AmfProperty::named(
                    "foo",
                    AmfValue::String("bar".to_string()),
                )],
            },
            ..Default::default()
        };
        let play = PlayRequest {
            playpath: "clip".to_string(),
            output_filename: "clip.flv".to_string(),
        };

        let command = build_recorder_command("rtmpdump", &request, &play);

        assert_eq!(
            command,
            vec![
                "rtmpdump",
                "-r",
                "rtmp://host/vod",
                "-a",
                "vod",
                "-p",
                "http://host/page",
                "-C",
                "NS:foo:bar",
                "-y",
                "clip",
                "-o",
                "clip.flv"
            ]
        );
    }

    #[test]
    fn unset_fields_are_omitted() {
        let request = ConnectionRequest {
            tc_url: "rtmp://host/app".to_string(),
            ..Default::default()
        };
        let play = PlayRequest {
            playpath: "p".to_string(),
            output_filename: "p.flv".to_string(),
        };

        let command = build_recorder_command("rtmpdump", &request, &play);

        assert_eq!(
            command,
            vec!["rtmpdump", "-r", "rtmp://host/app", "-y", "p", "-o", "p.flv"]
        );
    }
}
