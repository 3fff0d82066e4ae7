pub(crate) mod system_catalog;
