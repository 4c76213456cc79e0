/// One entry in the session trace.
///
/// Plain structured text keyed by the settle that produced it, so a replay
/// can be diffed against another run line by line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub settle_index: u64,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct EventBus {
    settle_index: u64,
    events: Vec<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new settle; subsequent events carry the new index.
    pub fn begin_settle(&mut self) -> u64 {
        self.settle_index += 1;
        self.settle_index
    }

    pub fn settle_index(&self) -> u64 {
        self.settle_index
    }

    pub fn emit(&mut self, kind: &'static str, message: impl Into<String>) {
        self.events.push(Event {
            settle_index: self.settle_index,
            kind,
            message: message.into(),
        });
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn events_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter(move |e| e.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::EventBus;

    #[test]
    fn records_events_with_settle_index() {
        let mut bus = EventBus::new();
        bus.emit("boot", "before any settle");
        bus.begin_settle();
        bus.begin_settle();
        bus.emit("dispatch", "hello");
        assert_eq!(bus.events().len(), 2);
        assert_eq!(bus.events()[0].settle_index, 0);
        assert_eq!(bus.events()[1].settle_index, 2);
        assert_eq!(bus.events_of("dispatch").count(), 1);
    }

    #[test]
    fn filter_borrows_kind_from_caller() {
        let mut bus = EventBus::new();
        bus.begin_settle();
        bus.emit("fetch", "heatmap seq=1");
        bus.emit("state", "save failed");
        bus.emit("fetch", "markers seq=1");
        let kind = String::from("fetch");
        let fetches: Vec<&str> = bus.events_of(&kind).map(|e| e.message.as_str()).collect();
        assert_eq!(fetches, vec!["heatmap seq=1", "markers seq=1"]);
    }
}
