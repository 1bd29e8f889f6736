//! Turns the "extras" object captured at connect time back into `-C` command
//! line arguments for the recorder, so the recorder can replay the client's
//! unrecognized connect parameters verbatim.
//!
//! Both the measure pass and the emit pass run the same traversal with a
//! different sink, so the number of argument slots they account for can never
//! drift apart.

use crate::amf0::{AmfObject, AmfProperty, AmfValue};

const FLAG: &str = "-C";
/// Fixed-width allowance for a `{:.6}`-formatted number.
const NUMBER_BYTES: usize = 40;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ArgBudget {
    pub bytes: usize,
    pub slots: usize,
}

/// Upper bound on the command-line footprint of `extras`, counted the same
/// way [`translate_extras`] emits it.
pub(crate) fn measure_extras(extras: &AmfObject) -> ArgBudget {
    let mut sink = MeasureSink::default();
    walk(extras, &mut sink);
    sink.budget
}

/// Render `extras` as a flat `-C <value>` argument vector.
pub(crate) fn translate_extras(extras: &AmfObject) -> Vec<String> {
    let budget = measure_extras(extras);
    let mut sink = EmitSink::default();
    walk(extras, &mut sink);
    assert_eq!(
        budget.slots, sink.used.slots,
        "extras traversal filled a different number of argument slots than measured"
    );
    sink.args
}

trait ExtrasSink {
    fn property(&mut self, property: &AmfProperty);
    fn close_object(&mut self);
}

fn walk<S: ExtrasSink>(object: &AmfObject, sink: &mut S) {
    for property in &object.properties {
        sink.property(property);
        if let AmfValue::Object(nested) = &property.value {
            walk(nested, sink);
            sink.close_object();
        }
    }
}

#[derive(Default)]
struct MeasureSink {
    budget: ArgBudget,
}

impl ExtrasSink for MeasureSink {
    fn property(&mut self, property: &AmfProperty) {
        self.budget.bytes += 4;
        self.budget.slots += 2;
        if property.name.is_some() {
            self.budget.bytes += 1;
        }
        self.budget.bytes += 2;
        if let Some(name) = &property.name {
            self.budget.bytes += name.len() + 1;
        }
        self.budget.bytes += match &property.value {
            AmfValue::Boolean(_) => 1,
            AmfValue::String(s) => s.len(),
            AmfValue::Number(_) => NUMBER_BYTES,
            AmfValue::Object(_) => 9,
            AmfValue::Null => 0,
        };
    }

    fn close_object(&mut self) {
        self.budget.slots += 2;
    }
}

#[derive(Default)]
struct EmitSink {
    args: Vec<String>,
    used: ArgBudget,
}

impl ExtrasSink for EmitSink {
    fn property(&mut self, property: &AmfProperty) {
        // `[N]TYPE[:name]:value`
        let mut value = String::new();
        if property.name.is_some() {
            value.push('N');
        }
        value.push(type_code(&property.value));
        value.push(':');
        if let Some(name) = &property.name {
            value.push_str(name);
            value.push(':');
        }
        match &property.value {
            AmfValue::Number(n) => value.push_str(&format!("{n:.6}")),
            AmfValue::Boolean(b) => value.push(if *b { '1' } else { '0' }),
            AmfValue::String(s) => value.push_str(s),
            // Opens a nested block, closed by the `O:0` pair below.
            AmfValue::Object(_) => value.push('1'),
            AmfValue::Null => {}
        }

        self.used.bytes += 4 + value.len();
        self.used.slots += 2;
        self.args.push(FLAG.to_string());
        self.args.push(value);
    }

    fn close_object(&mut self) {
        self.used.bytes += 7;
        self.used.slots += 2;
        self.args.push(FLAG.to_string());
        self.args.push("O:0".to_string());
    }
}

fn type_code(value: &AmfValue) -> char {
    match value {
        AmfValue::Number(_) => 'N',
        AmfValue::Boolean(_) => 'B',
        AmfValue::String(_) => 'S',
        AmfValue::Object(_) => 'O',
        AmfValue::Null => 'Z',
    }
}
