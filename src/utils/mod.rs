pub(crate) mod scoped_timer;
