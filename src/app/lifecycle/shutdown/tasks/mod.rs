pub(crate) mod stop_server;
