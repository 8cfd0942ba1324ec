#![allow(dead_code)]

pub(crate) mod cluster;

pub(crate) mod logging;

pub(crate) mod loopback;

pub(crate) mod network;
