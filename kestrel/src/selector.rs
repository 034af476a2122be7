use crate::event::{Event, Topic, TopicId, TopicSet};
use smallvec::SmallVec;
use std::any::Any;
use std::sync::Arc;

struct Row<Eff> {
    topic: TopicId,
    transform: Arc<dyn Fn(&Event) -> Option<Eff> + Send + Sync>,
}

impl<Eff> Row<Eff> {
    #[inline]
    fn select(&self, event: &Event) -> Option<Eff> {
        if event.topic() != self.topic {
            return None;
        }
        (self.transform)(event)
    }
}

impl<Eff> Clone for Row<Eff> {
    fn clone(&self) -> Self {
        Row {
            topic: self.topic,
            transform: self.transform.clone(),
        }
    }
}

/// Maps raw events to a cell's effect type, by topic.
///
/// Rows are tried in the order they were added and the first match wins. Almost every cell listens
/// to exactly one topic, so the single-row case is stored inline and matched without a loop.
pub struct Selector<Eff> {
    rows: SmallVec<Row<Eff>, 1>,
}

impl<Eff: 'static> Selector<Eff> {
    pub fn new<V: Any + Send + Sync>(
        topic: &Topic<V>,
        transform: impl Fn(&V) -> Eff + Send + Sync + 'static,
    ) -> Self {
        Selector {
            rows: SmallVec::new(),
        }
        .or(topic, transform)
    }

    /// Adds a lower-priority row.
    pub fn or<V: Any + Send + Sync>(
        mut self,
        topic: &Topic<V>,
        transform: impl Fn(&V) -> Eff + Send + Sync + 'static,
    ) -> Self {
        let key = topic.clone();
        self.rows.push(Row {
            topic: topic.id(),
            transform: Arc::new(move |event: &Event| event.extract(&key).map(&transform)),
        });
        self
    }

    pub fn select(&self, event: &Event) -> Option<Eff> {
        match &self.rows[..] {
            [row] => row.select(event),
            rows => rows.iter().find_map(|row| row.select(event)),
        }
    }

    /// Whether any of this selector's topics are in `topics`.
    pub fn matches_any(&self, topics: &TopicSet) -> bool {
        match &self.rows[..] {
            [row] => topics.contains(&row.topic),
            rows => rows.iter().any(|row| topics.contains(&row.topic)),
        }
    }

    pub fn topics(&self) -> impl Iterator<Item = TopicId> + '_ {
        self.rows.iter().map(|row| row.topic)
    }
}

impl<Eff> Clone for Selector<Eff> {
    fn clone(&self) -> Self {
        Selector {
            rows: self.rows.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TaskId;

    #[test]
    fn first_matching_row_wins() {
        let numbers = Topic::<i64>::new("numbers");
        let words = Topic::<String>::new("words");
        let other = Topic::<i64>::new("other");

        let selector = Selector::new(&numbers, |n| *n).or(&words, |w| w.len() as i64);

        assert_eq!(selector.select(&Event::new(&numbers, 4, TaskId(0))), Some(4));
        assert_eq!(
            selector.select(&Event::new(&words, "hello".to_string(), TaskId(0))),
            Some(5)
        );
        assert_eq!(selector.select(&Event::new(&other, 4, TaskId(0))), None);
    }

    #[test]
    fn interest_is_by_topic_identity() {
        let numbers = Topic::<i64>::new("numbers");
        let twin = Topic::<i64>::new("numbers");
        let selector = Selector::new(&numbers, |n| *n);

        let mut topics = TopicSet::default();
        topics.insert(twin.id());
        assert!(!selector.matches_any(&topics));

        topics.insert(numbers.id());
        assert!(selector.matches_any(&topics));
        assert_eq!(selector.topics().collect::<Vec<_>>(), vec![numbers.id()]);
    }
}
