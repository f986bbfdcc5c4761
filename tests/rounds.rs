mod rounds {
    pub mod helpers;

    mod broadcast;
    mod simulation;
    mod topology;
}
