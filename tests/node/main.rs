// Node integration tests
// Whole peers talking over loopback UDP
