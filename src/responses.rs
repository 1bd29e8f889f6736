//! Builders for the fixed-shape command replies. All of them are pure, the
//! dispatcher decides when to send what.

use crate::amf0::{AmfObject, AmfProperty, AmfValue, encode_amf0_values};
use crate::message::{RtmpMessage, TYPE_COMMAND_AMF0};

const FMS_VERSION: &str = "FMS/3,5,1,525";
const SERVER_VERSION: &str = "3,5,1,525";
const CAPABILITIES: f64 = 31.0;
const MODE: f64 = 1.0;

const PLAY_START_CODE: &str = "NetStream.Play.Start";
const PLAY_START_DESCRIPTION: &str = "Started playing";
const PLAY_STOP_CODE: &str = "NetStream.Play.Stop";
const PLAY_STOP_DESCRIPTION: &str = "Stopped playing";

fn command(values: &[AmfValue]) -> RtmpMessage {
    RtmpMessage {
        timestamp: 0,
        type_id: TYPE_COMMAND_AMF0,
        stream_id: 0,
        payload: encode_amf0_values(values).unwrap_or_default(),
    }
}

fn string(s: &str) -> AmfValue {
    AmfValue::String(s.to_string())
}

/// `_result` for `connect`: the fixed server identity plus a status object
/// echoing the client's negotiated object encoding.
pub(crate) fn connect_result(txn: f64, object_encoding: f64) -> RtmpMessage {
    let properties = AmfObject {
        properties: vec![
            AmfProperty::named("fmsVer", string(FMS_VERSION)),
            AmfProperty::named("capabilities", AmfValue::Number(CAPABILITIES)),
            AmfProperty::named("mode", AmfValue::Number(MODE)),
        ],
    };
    let information = AmfObject {
        properties: vec![
            AmfProperty::named("level", string("status")),
            AmfProperty::named("code", string("NetConnection.Connect.Success")),
            AmfProperty::named("description", string("Connection succeeded.")),
            AmfProperty::named("objectEncoding", AmfValue::Number(object_encoding)),
            AmfProperty::named(
                "data",
                AmfValue::Object(AmfObject {
                    properties: vec![AmfProperty::named("version", string(SERVER_VERSION))],
                }),
            ),
        ],
    };

    command(&[
        string("_result"),
        AmfValue::Number(txn),
        AmfValue::Object(properties),
        AmfValue::Object(information),
    ])
}

/// Bare numeric `_result`, used for `createStream` ids and stream lengths.
pub(crate) fn result_number(txn: f64, value: f64) -> RtmpMessage {
    command(&[
        string("_result"),
        AmfValue::Number(txn),
        AmfValue::Null,
        AmfValue::Number(value),
    ])
}

fn play_status(code: &str, description: &str, playpath: &str) -> RtmpMessage {
    let information = AmfObject {
        properties: vec![
            AmfProperty::named("level", string("status")),
            AmfProperty::named("code", string(code)),
            AmfProperty::named("description", string(description)),
            AmfProperty::named("details", string(playpath)),
            AmfProperty::named("clientid", string("clientid")),
        ],
    };

    command(&[
        string("onStatus"),
        AmfValue::Number(0.0),
        AmfValue::Object(information),
    ])
}

pub(crate) fn play_start(playpath: &str) -> RtmpMessage {
    play_status(PLAY_START_CODE, PLAY_START_DESCRIPTION, playpath)
}

pub(crate) fn play_stop(playpath: &str) -> RtmpMessage {
    play_status(PLAY_STOP_CODE, PLAY_STOP_DESCRIPTION, playpath)
}
