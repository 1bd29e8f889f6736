use std::io::Write;

use bytes::Bytes;
use tracing::{debug, error, trace, warn};

use crate::amf0::{self, AmfObject, AmfValue, decode_amf0_values};
use crate::error::RtmpError;
use crate::message_writer::{RtmpMessageWriter, send_stream_begin, send_stream_eof};
use crate::recorder::{RecorderLauncher, Spawn, derive_output_filename};
use crate::responses;

/// Stream length is not tracked, every `getStreamLength` gets this answer.
const STREAM_LENGTH_SECS: f64 = 10.0;

/// Connect-object field names that populate [`ConnectionRequest`] directly.
/// Everything else ends up in `extras`.
const RECOGNIZED_FIELDS: [&str; 8] = [
    "app",
    "flashVer",
    "swfUrl",
    "tcUrl",
    "pageUrl",
    "audioCodecs",
    "videoCodecs",
    "objectEncoding",
];

/// Parameters a client announced in its `connect` invocation.
#[derive(Debug, Default)]
pub(crate) struct ConnectionRequest {
    pub app: String,
    pub flash_ver: String,
    pub swf_url: String,
    pub tc_url: String,
    pub page_url: String,
    pub audio_codecs: f64,
    pub video_codecs: f64,
    pub object_encoding: f64,
    pub extras: AmfObject,
}

#[derive(Debug)]
pub(crate) struct PlayRequest {
    pub playpath: String,
    pub output_filename: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionOutcome {
    Continue,
    Close,
}

/// Per-connection invoke dispatcher. The stream id counter and the captured
/// connect parameters live here, never on the server.
pub(crate) struct Session<S: Spawn> {
    request: ConnectionRequest,
    stream_id: u32,
    launcher: RecorderLauncher<S>,
}

impl<S: Spawn> Session<S> {
    pub fn new(launcher: RecorderLauncher<S>) -> Self {
        Self {
            request: ConnectionRequest::default(),
            stream_id: 0,
            launcher,
        }
    }

    /// Routes one decoded invoke body. Malformed bodies are logged and
    /// dropped, the connection stays up.
    pub fn serve_invoke<W: Write>(
        &mut self,
        body: Bytes,
        writer: &mut RtmpMessageWriter<W>,
    ) -> Result<SessionOutcome, RtmpError> {
        if body.first() != Some(&amf0::STRING) {
            warn!("sanity failed, no string method name in invoke packet");
            return Ok(SessionOutcome::Continue);
        }

        let mut invocation = match decode_amf0_values(body) {
            Ok(invocation) => invocation,
            Err(error) => {
                error!(?error, "error decoding invoke packet");
                return Ok(SessionOutcome::Continue);
            }
        };
        trace!(?invocation, "decoded invoke");

        let method = invocation.string_at(0).unwrap_or_default().to_string();
        let txn = invocation.number_at(1).unwrap_or(0.0);
        debug!(%method, "client invoking");

        match method.as_str() {
            "connect" => {
                self.request = extract_connection_request(&mut invocation);
                writer.write(&responses::connect_result(
                    txn,
                    self.request.object_encoding,
                ))?;
                Ok(SessionOutcome::Continue)
            }
            "createStream" => {
                self.stream_id += 1;
                writer.write(&responses::result_number(txn, self.stream_id as f64))?;
                Ok(SessionOutcome::Continue)
            }
            "getStreamLength" => {
                writer.write(&responses::result_number(txn, STREAM_LENGTH_SECS))?;
                Ok(SessionOutcome::Continue)
            }
            "play" => {
                self.serve_play(&invocation, writer)?;
                Ok(SessionOutcome::Close)
            }
            other => {
                debug!(method = other, "ignoring unknown invoke method");
                Ok(SessionOutcome::Continue)
            }
        }
    }

    fn serve_play<W: Write>(
        &mut self,
        invocation: &AmfObject,
        writer: &mut RtmpMessageWriter<W>,
    ) -> Result<(), RtmpError> {
        let playpath = invocation.string_at(3).unwrap_or_default().to_string();
        let play = PlayRequest {
            output_filename: derive_output_filename(&playpath),
            playpath,
        };
        debug!(
            playpath = %play.playpath,
            output = %play.output_filename,
            "play requested"
        );

        // No tcUrl means the recorder could never reconnect, skip the launch.
        if !self.request.tc_url.is_empty() {
            self.launcher.launch(&self.request, &play);
        }

        send_stream_begin(writer, 1)?;
        writer.write(&responses::play_start(&play.playpath))?;
        send_stream_eof(writer, 1)?;
        writer.write(&responses::play_stop(&play.playpath))?;
        Ok(())
    }
}

/// Pulls the recognized connect parameters out of the invocation. Remaining
/// connect-object properties and any invocation arguments past the third move
/// into `extras`; the invocation itself is left truncated to method,
/// transaction id and connect object.
pub(crate) fn extract_connection_request(invocation: &mut AmfObject) -> ConnectionRequest {
    let mut request = ConnectionRequest::default();

    if let Some(AmfValue::Object(connect_object)) = invocation.value_at_mut(2) {
        for property in std::mem::take(&mut connect_object.properties) {
            let recognized = match (property.name.as_deref(), &property.value) {
                (Some("app"), AmfValue::String(s)) => {
                    request.app = s.clone();
                    true
                }
                (Some("flashVer"), AmfValue::String(s)) => {
                    request.flash_ver = s.clone();
                    true
                }
                (Some("swfUrl"), AmfValue::String(s)) => {
                    request.swf_url = s.clone();
                    true
                }
                (Some("tcUrl"), AmfValue::String(s)) => {
                    request.tc_url = s.clone();
                    true
                }
                (Some("pageUrl"), AmfValue::String(s)) => {
                    request.page_url = s.clone();
                    true
                }
                (Some("audioCodecs"), AmfValue::Number(n)) => {
                    request.audio_codecs = *n;
                    true
                }
                (Some("videoCodecs"), AmfValue::Number(n)) => {
                    request.video_codecs = *n;
                    true
                }
                (Some("objectEncoding"), AmfValue::Number(n)) => {
                    request.object_encoding = *n;
                    true
                }
                // Recognized name with an unusable value type, consumed
                // without populating anything.
                (Some(name), _) => RECOGNIZED_FIELDS.contains(&name),
                (None, _) => false,
            };
            if !recognized {
                request.extras.properties.push(property);
            }
        }
    }

    if invocation.len() > 3 {
        let trailing = invocation.properties.split_off(3);
        request.extras.properties.extend(trailing);
    }

    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf0::{AmfProperty, encode_amf0_values};
    use crate::message::{TYPE_COMMAND_AMF0, TYPE_USER_CONTROL};
    use crate::message_reader::RtmpMessageReader;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    #[derive(Default, Clone)]
    struct RecordingSpawner {
        commands: Rc<RefCell<Vec<Vec<String>>>>,
    }

    impl Spawn for RecordingSpawner {
        fn spawn_detached(&mut self, argv: &[String]) {
            self.commands.borrow_mut().push(argv.to_vec());
        }
    }

    fn session_with_spawner() -> (Session<RecordingSpawner>, RecordingSpawner) {
        let spawner = RecordingSpawner::default();
        let launcher = RecorderLauncher::with_spawner("rtmpdump".to_string(), spawner.clone());
        (Session::new(launcher), spawner)
    }

    fn invoke(values: &[AmfValue]) -> Bytes {
        encode_amf0_values(values).unwrap()
    }

    fn connect_invoke(connect_object: AmfObject) -> Bytes {
        invoke(&[
            AmfValue::String("connect".to_string()),
            AmfValue::Number(1.0),
            AmfValue::Object(connect_object),
        ])
    }

    /// Replies written by the session, read back through the chunk reader.
    fn written_messages(wire: Vec<u8>) -> Vec<crate::message::RtmpMessage> {
        RtmpMessageReader::new(Cursor::new(wire))
            .map(|m| m.unwrap())
            .collect()
    }

    fn decoded_command(message: &crate::message::RtmpMessage) -> AmfObject {
        assert_eq!(message.type_id, TYPE_COMMAND_AMF0);
        decode_amf0_values(message.payload.clone()).unwrap()
    }

    #[test]
    fn connect_extracts_fields_and_replies_success() {
        let (mut session, _) = session_with_spawner();
        let mut wire = Vec::new();
        let mut writer = RtmpMessageWriter::new(&mut wire);

        let connect_object = AmfObject {
            properties: vec![
                AmfProperty::named("app", AmfValue::String("vod".to_string())),
                AmfProperty::named("tcUrl", AmfValue::String("rtmp://h/vod".to_string())),
                AmfProperty::named("objectEncoding", AmfValue::Number(3.0)),
                AmfProperty::named("foo", AmfValue::String("bar".to_string())),
            ],
        };
        let outcome = session
            .serve_invoke(connect_invoke(connect_object), &mut writer)
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Continue);
        assert_eq!(session.request.app, "vod");
        assert_eq!(session.request.tc_url, "rtmp://h/vod");
        assert_eq!(session.request.object_encoding, 3.0);
        // `foo` went to extras, not to the recognized fields.
        assert_eq!(
            session.request.extras.properties,
            vec![AmfProperty::named(
                "foo",
                AmfValue::String("bar".to_string())
            )]
        );

        let messages = written_messages(wire);
        assert_eq!(messages.len(), 1);
        let reply = decoded_command(&messages[0]);
        assert_eq!(reply.string_at(0), Some("_result"));
        assert_eq!(reply.number_at(1), Some(1.0));
    }

    #[test]
    fn create_stream_ids_are_strictly_increasing() {
        let (mut session, _) = session_with_spawner();
        let mut wire = Vec::new();
        let mut writer = RtmpMessageWriter::new(&mut wire);

        for _ in 0..3 {
            session
                .serve_invoke(
                    invoke(&[
                        AmfValue::String("createStream".to_string()),
                        AmfValue::Number(2.0),
                        AmfValue::Null,
                    ]),
                    &mut writer,
                )
                .unwrap();
        }

        let ids: Vec<f64> = written_messages(wire)
            .iter()
            .map(|m| decoded_command(m).number_at(3).unwrap())
            .collect();
        assert_eq!(ids, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn get_stream_length_replies_fixed_constant() {
        let (mut session, _) = session_with_spawner();
        let mut wire = Vec::new();
        let mut writer = RtmpMessageWriter::new(&mut wire);

        session
            .serve_invoke(
                invoke(&[
                    AmfValue::String("getStreamLength".to_string()),
                    AmfValue::Number(3.0),
                    AmfValue::Null,
                    AmfValue::String("whatever".to_string()),
                ]),
                &mut writer,
            )
            .unwrap();

        let messages = written_messages(wire);
        assert_eq!(decoded_command(&messages[0]).number_at(3), Some(10.0));
    }

    #[test]
    fn play_launches_recorder_and_scripts_start_stop() {
        let (mut session, spawner) = session_with_spawner();
        let mut wire = Vec::new();
        let mut writer = RtmpMessageWriter::new(&mut wire);

        let connect_object = AmfObject {
            properties: vec![
                AmfProperty::named("app", AmfValue::String("vod".to_string())),
                AmfProperty::named("tcUrl", AmfValue::String("rtmp://h/vod".to_string())),
                AmfProperty::named("foo", AmfValue::String("bar".to_string())),
            ],
        };
        session
            .serve_invoke(connect_invoke(connect_object), &mut writer)
            .unwrap();

        let outcome = session
            .serve_invoke(
                invoke(&[
                    AmfValue::String("play".to_string()),
                    AmfValue::Number(4.0),
                    AmfValue::Null,
                    AmfValue::String("dir/clip?x=1".to_string()),
                ]),
                &mut writer,
            )
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Close);

        let commands = spawner.commands.borrow();
        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0],
            vec![
                "rtmpdump",
                "-r",
                "rtmp://h/vod",
                "-a",
                "vod",
                "-C",
                "NS:foo:bar",
                "-y",
                "dir/clip?x=1",
                "-o",
                "clip.flv"
            ]
        );

        // connect reply, stream begin, play start, stream eof, play stop
        let messages = written_messages(wire);
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[1].type_id, TYPE_USER_CONTROL);
        assert_eq!(messages[3].type_id, TYPE_USER_CONTROL);

        let start = decoded_command(&messages[2]);
        let stop = decoded_command(&messages[4]);
        assert_eq!(start.string_at(0), Some("onStatus"));
        assert_eq!(stop.string_at(0), Some("onStatus"));

        let code_of = |reply: &AmfObject| {
            let Some(AmfValue::Object(information)) = reply.value_at(2) else {
                panic!("missing status object");
            };
            information
                .properties
                .iter()
                .find(|p| p.name.as_deref() == Some("code"))
                .map(|p| p.value.clone())
        };
        assert_eq!(
            code_of(&start),
            Some(AmfValue::String("NetStream.Play.Start".to_string()))
        );
        assert_eq!(
            code_of(&stop),
            Some(AmfValue::String("NetStream.Play.Stop".to_string()))
        );
    }

    #[test]
    fn play_without_tc_url_skips_launch_but_still_notifies() {
        let (mut session, spawner) = session_with_spawner();
        let mut wire = Vec::new();
        let mut writer = RtmpMessageWriter::new(&mut wire);

        let outcome = session
            .serve_invoke(
                invoke(&[
                    AmfValue::String("play".to_string()),
                    AmfValue::Number(2.0),
                    AmfValue::Null,
                    AmfValue::String("clip".to_string()),
                ]),
                &mut writer,
            )
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Close);
        assert!(spawner.commands.borrow().is_empty());
        // stream begin, play start, stream eof, play stop
        assert_eq!(written_messages(wire).len(), 4);
    }

    #[test]
    fn unknown_method_is_ignored_without_reply() {
        let (mut session, _) = session_with_spawner();
        let mut wire = Vec::new();
        let mut writer = RtmpMessageWriter::new(&mut wire);

        let outcome = session
            .serve_invoke(
                invoke(&[
                    AmfValue::String("releaseStream".to_string()),
                    AmfValue::Number(2.0),
                ]),
                &mut writer,
            )
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Continue);
        assert!(wire.is_empty());
    }

    #[test]
    fn invoke_not_starting_with_string_is_dropped() {
        let (mut session, _) = session_with_spawner();
        let mut wire = Vec::new();
        let mut writer = RtmpMessageWriter::new(&mut wire);

        let outcome = session
            .serve_invoke(
                invoke(&[AmfValue::Number(7.0), AmfValue::Number(2.0)]),
                &mut writer,
            )
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Continue);
        assert!(wire.is_empty());
    }

    #[test]
    fn undecodable_invoke_is_dropped() {
        let (mut session, _) = session_with_spawner();
        let mut wire = Vec::new();
        let mut writer = RtmpMessageWriter::new(&mut wire);

        // String marker with a length pointing past the end of the payload.
        let body = Bytes::from_static(&[amf0::STRING, 0xFF, 0xFF, b'x']);
        let outcome = session.serve_invoke(body, &mut writer).unwrap();

        assert_eq!(outcome, SessionOutcome::Continue);
        assert!(wire.is_empty());
    }

    #[test]
    fn trailing_connect_arguments_become_extras() {
        let mut invocation = decode_amf0_values(invoke(&[
            AmfValue::String("connect".to_string()),
            AmfValue::Number(1.0),
            AmfValue::Object(AmfObject::default()),
            AmfValue::Boolean(true),
            AmfValue::String("trailing".to_string()),
        ]))
        .unwrap();

        let request = extract_connection_request(&mut invocation);

        assert_eq!(invocation.len(), 3);
        assert_eq!(
            request.extras.properties,
            vec![
                AmfProperty::unnamed(AmfValue::Boolean(true)),
                AmfProperty::unnamed(AmfValue::String("trailing".to_string())),
            ]
        );
    }
}
