pub mod incident_poller;
