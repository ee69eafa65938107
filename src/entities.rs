//! Registry of extractable metadata entity types.
//!
//! Each entry ties an entity kind to its log label, output file and
//! post-processing, so the metadata job is a single loop over the table.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    OrgUnits,
    OrgUnitLevels,
    OrgUnitGroups,
    Datasets,
    DataElements,
    DataElementGroups,
    Indicators,
    IndicatorGroups,
    CategoryOptionCombos,
}

/// Post-processing applied to a freshly fetched metadata table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcess {
    None,
    /// Flatten list columns into comma-joined strings.
    JoinLists,
    /// Add ancestor columns and apply the org unit column layout.
    OrgUnitHierarchy,
}

#[derive(Debug, Clone, Copy)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub label: &'static str,
    pub file_name: &'static str,
    pub post_process: PostProcess,
}

pub const ENTITIES: [EntityDescriptor; 9] = [
    EntityDescriptor {
        kind: EntityKind::OrgUnits,
        label: "organisation units",
        file_name: "organisation_units.csv",
        post_process: PostProcess::OrgUnitHierarchy,
    },
    EntityDescriptor {
        kind: EntityKind::OrgUnitLevels,
        label: "organisation unit levels",
        file_name: "organisation_unit_levels.csv",
        post_process: PostProcess::None,
    },
    EntityDescriptor {
        kind: EntityKind::OrgUnitGroups,
        label: "organisation unit groups",
        file_name: "organisation_unit_groups.csv",
        post_process: PostProcess::JoinLists,
    },
    EntityDescriptor {
        kind: EntityKind::Datasets,
        label: "datasets",
        file_name: "datasets.csv",
        post_process: PostProcess::JoinLists,
    },
    EntityDescriptor {
        kind: EntityKind::DataElements,
        label: "data elements",
        file_name: "data_elements.csv",
        post_process: PostProcess::None,
    },
    EntityDescriptor {
        kind: EntityKind::DataElementGroups,
        label: "data element groups",
        file_name: "data_element_groups.csv",
        post_process: PostProcess::JoinLists,
    },
    EntityDescriptor {
        kind: EntityKind::Indicators,
        label: "indicators",
        file_name: "indicators.csv",
        post_process: PostProcess::None,
    },
    EntityDescriptor {
        kind: EntityKind::IndicatorGroups,
        label: "indicator groups",
        file_name: "indicator_groups.csv",
        post_process: PostProcess::JoinLists,
    },
    EntityDescriptor {
        kind: EntityKind::CategoryOptionCombos,
        label: "category option combos",
        file_name: "category_option_combos.csv",
        post_process: PostProcess::JoinLists,
    },
];

impl EntityKind {
    pub fn descriptor(self) -> &'static EntityDescriptor {
        // ENTITIES covers every variant; the index mirrors declaration order.
        &ENTITIES[self as usize]
    }
}

/// Descriptors for the selected kinds, in registry order, without duplicates.
pub fn selected(kinds: &[EntityKind]) -> Vec<&'static EntityDescriptor> {
    let mut kinds = kinds.to_vec();
    kinds.sort_unstable();
    kinds.dedup();
    kinds.into_iter().map(EntityKind::descriptor).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_lookup_matches_kind() {
        for d in &ENTITIES {
            assert_eq!(d.kind.descriptor().kind, d.kind);
        }
    }

    #[test]
    fn file_names_are_unique_csv_names() {
        let mut names: Vec<_> = ENTITIES.iter().map(|d| d.file_name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ENTITIES.len());
        assert!(names.iter().all(|n| n.ends_with(".csv")));
    }

    #[test]
    fn selection_keeps_registry_order_and_dedups() {
        let picked = selected(&[
            EntityKind::CategoryOptionCombos,
            EntityKind::OrgUnits,
            EntityKind::OrgUnits,
        ]);
        let kinds: Vec<_> = picked.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![EntityKind::OrgUnits, EntityKind::CategoryOptionCombos]);
    }

    #[test]
    fn multi_valued_entities_flatten_lists() {
        for kind in [
            EntityKind::OrgUnitGroups,
            EntityKind::Datasets,
            EntityKind::DataElementGroups,
            EntityKind::IndicatorGroups,
            EntityKind::CategoryOptionCombos,
        ] {
            assert_eq!(kind.descriptor().post_process, PostProcess::JoinLists);
        }
    }
}
