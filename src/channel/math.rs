use std::sync::{Arc, Mutex, Weak};

use crate::data::math::{MathEvaluator, MathInputs, MathKind};
use crate::data::quantity::{MeasuredQuantity, Unit};
use crate::data::signal::AnalogTimeSignal;
use crate::error::Result;
use crate::events::{lock, EventFilter, ListenerId, SignalEventKind};

/// A derived channel: one evaluator feeding one output signal.
///
/// The evaluator is stepped from the `SAMPLE_APPENDED` listeners of its
/// inputs. The evaluator mutex is held across one step and the appends into
/// the output, so concurrent notifications of both inputs of a two-input
/// evaluator are serialised.
#[derive(Debug)]
pub struct MathChannel {
    name: String,
    output: Arc<AnalogTimeSignal>,
    evaluator: Mutex<MathEvaluator>,
    listeners: Mutex<Vec<(Arc<AnalogTimeSignal>, ListenerId)>>,
}

impl MathChannel {
    /// Build the evaluator, subscribe to the inputs and consume the samples
    /// the inputs already hold.
    pub fn new(
        name: impl Into<String>,
        quantity: MeasuredQuantity,
        unit: Unit,
        kind: MathKind,
        inputs: MathInputs,
        start_timestamp: f64,
    ) -> Result<Arc<Self>> {
        let name = name.into();
        let input_signals: Vec<Arc<AnalogTimeSignal>> = inputs.signals().into_iter().cloned().collect();
        let evaluator = MathEvaluator::new(kind, inputs, start_timestamp)?;
        let output = AnalogTimeSignal::new_shared(quantity, unit, name.as_str(), start_timestamp);

        let channel = Arc::new(Self {
            name,
            output,
            evaluator: Mutex::new(evaluator),
            listeners: Mutex::new(Vec::new()),
        });

        let mut ids = Vec::with_capacity(input_signals.len());
        for signal in input_signals {
            let weak: Weak<MathChannel> = Arc::downgrade(&channel);
            let id = signal
                .notifier()
                .connect(EventFilter::only(SignalEventKind::SAMPLE_APPENDED), move |_| {
                    if let Some(ch) = weak.upgrade() {
                        ch.process();
                    }
                });
            ids.push((signal, id));
        }
        *lock(&channel.listeners) = ids;

        log::info!("Math channel {} = {:?}", channel.name, kind);
        channel.process();
        Ok(channel)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output(&self) -> &Arc<AnalogTimeSignal> {
        &self.output
    }

    pub fn kind(&self) -> MathKind {
        *lock(&self.evaluator).kind()
    }

    /// Evaluate every input sample not consumed yet.
    pub fn process(&self) {
        let mut evaluator = lock(&self.evaluator);
        let points = evaluator.step();
        if points.is_empty() {
            return;
        }
        let (digits, decimal_places) = evaluator.output_precision();
        for [t, y] in points {
            self.output.append(y, t, digits, decimal_places);
        }
    }

    pub(crate) fn on_start_timestamp_changed(&self, timestamp: f64) {
        lock(&self.evaluator).on_start_timestamp_changed(timestamp);
    }
}

impl Drop for MathChannel {
    fn drop(&mut self) {
        let listeners = std::mem::take(self.listeners.get_mut().unwrap_or_else(std::sync::PoisonError::into_inner));
        for (signal, id) in listeners {
            signal.notifier().disconnect(id);
        }
    }
}
