//! Keyed in-memory table with a store-assigned integer sequence.

use std::collections::BTreeMap;

use mfgplan_core::Entity;

/// Rows keyed by entity id, iterated in id order.
#[derive(Debug)]
pub struct Table<V: Entity> {
    rows: BTreeMap<V::Id, V>,
    last_id: i64,
}

impl<V: Entity> Default for Table<V> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<V> Table<V>
where
    V: Entity + Clone,
    V::Id: From<i64>,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and insert a row under the next identifier.
    ///
    /// The sequence only advances when `build` succeeds, and identifiers are
    /// never reused after a removal.
    pub fn insert_next<E>(&mut self, build: impl FnOnce(V::Id) -> Result<V, E>) -> Result<V, E> {
        let value = build(V::Id::from(self.last_id + 1))?;
        self.last_id += 1;
        self.rows.insert(value.id(), value.clone());
        Ok(value)
    }

    pub fn get(&self, id: V::Id) -> Option<&V> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: V::Id) -> Option<&mut V> {
        self.rows.get_mut(&id)
    }

    pub fn contains(&self, id: V::Id) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn insert(&mut self, value: V) {
        self.rows.insert(value.id(), value);
    }

    pub fn remove(&mut self, id: V::Id) -> Option<V> {
        self.rows.remove(&id)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> {
        self.rows.values()
    }

    pub fn list(&self) -> Vec<V> {
        self.rows.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfgplan_core::MenuId;

    #[derive(Debug, Clone, PartialEq)]
    struct Row(MenuId);

    impl Entity for Row {
        type Id = MenuId;

        fn id(&self) -> MenuId {
            self.0
        }
    }

    fn ok(id: MenuId) -> Result<Row, &'static str> {
        Ok(Row(id))
    }

    #[test]
    fn ids_are_sequential_and_not_reused() {
        let mut table: Table<Row> = Table::new();
        let a = table.insert_next(ok).unwrap().0;
        let b = table.insert_next(ok).unwrap().0;
        table.remove(b);
        let c = table.insert_next(ok).unwrap().0;

        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
        assert_eq!(c.get(), 3);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn rejected_rows_do_not_consume_ids() {
        let mut table: Table<Row> = Table::new();
        assert!(table.insert_next(|_| Err::<Row, _>("bad row")).is_err());
        assert!(table.is_empty());

        let first = table.insert_next(ok).unwrap();
        assert_eq!(first.0.get(), 1);
    }

    #[test]
    fn list_is_ordered_by_id() {
        let mut table: Table<Row> = Table::new();
        table.insert(Row(MenuId::new(5)));
        table.insert(Row(MenuId::new(2)));
        table.insert(Row(MenuId::new(9)));

        let ids: Vec<i64> = table.list().into_iter().map(|r| r.0.get()).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }
}
